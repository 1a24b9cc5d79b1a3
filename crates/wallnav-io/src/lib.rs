//! wallnav-io — point-set readers (XYZ/CSV text, ASCII PLY, LAS) and a PLY writer.

use anyhow::{bail, Context, Result};
use las::Read;
use log::debug;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Ply, Property};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use wallnav_core::{PointSet, COLOR_KEYS};

pub fn read_las(path: &Path) -> Result<PointSet> {
    let mut r = las::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let hdr = r.header().clone();

    let mut c = PointSet::default();
    c.reserve(hdr.number_of_points() as usize);

    for rec in r.points() {
        let p = rec?;
        // x/y/z are f64 with scale/offset already applied by Reader
        c.push(p.x as f32, p.y as f32, p.z as f32);

        c.attrs_f32.entry("intensity".into())
            .or_default()
            .push(p.intensity as f32);

        match p.color {
            Some(color) => {
                let rgb = [color.red, color.green, color.blue];
                for (k, v) in COLOR_KEYS.iter().zip(rgb) {
                    c.attrs_f32.entry((*k).into()).or_default().push(v as f32);
                }
            }
            None => {
                // keep columns aligned if they already exist
                for k in COLOR_KEYS {
                    if let Some(col) = c.attrs_f32.get_mut(k) { col.push(0.0); }
                }
            }
        }
    }
    Ok(c)
}

pub fn read_ply_ascii(path: &Path) -> Result<PointSet> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(f);
    let parser = Parser::<DefaultElement>::new();
    let ply: Ply<DefaultElement> = parser.read_ply(&mut reader)?;

    // Expect "vertex" element with float x,y,z.
    let vertex = ply.payload.get("vertex")
        .ok_or_else(|| anyhow::anyhow!("PLY missing 'vertex' element"))?;

    let mut c = PointSet::default();
    c.reserve(vertex.len());
    let with_color = vertex.first().is_some_and(|el| COLOR_KEYS.iter().all(|k| el.contains_key(*k)));

    for el in vertex {
        c.push(get_f32(el, "x")?, get_f32(el, "y")?, get_f32(el, "z")?);
        if with_color {
            for k in COLOR_KEYS {
                let v = get_f32(el, k).unwrap_or(0.0);
                c.attrs_f32.entry(k.to_string()).or_default().push(v);
            }
        }
    }
    Ok(c)
}

fn get_f32(el: &DefaultElement, key: &str) -> Result<f32> {
    match el.get(key) {
        Some(Property::Float(v)) => Ok(*v),
        Some(Property::Double(v)) => Ok(*v as f32),
        Some(Property::UChar(v)) => Ok(*v as f32),
        Some(Property::UShort(v)) => Ok(*v as f32),
        Some(Property::Int(v)) => Ok(*v as f32),
        Some(_) => bail!("property '{}' not float-like", key),
        None => bail!("missing property '{}'", key),
    }
}

/// Tabular text: one point per line, whitespace- or comma-separated.
/// First three columns are x y z; columns 4..6, when present on the first
/// record, are read as red green blue. Header lines before the first record
/// and `#` comments are skipped.
pub fn read_xyz(path: &Path) -> Result<PointSet> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    parse_xyz(BufReader::new(f)).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_xyz<R: BufRead>(reader: R) -> Result<PointSet> {
    let mut c = PointSet::default();
    let mut with_color: Option<bool> = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }

        let vals: Vec<f32> = line
            .split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace())
            .filter(|s| !s.is_empty())
            .map_while(|s| s.parse::<f32>().ok())
            .collect();

        if vals.len() < 3 {
            if c.is_empty() { continue; } // header (column names or a point count)
            bail!("line {}: expected at least 3 numeric columns", lineno + 1);
        }
        if !vals[..3].iter().all(|v| v.is_finite()) {
            bail!("line {}: non-finite coordinate", lineno + 1);
        }
        c.push(vals[0], vals[1], vals[2]);

        let color = *with_color.get_or_insert(vals.len() >= 6);
        if color {
            for (j, k) in COLOR_KEYS.iter().enumerate() {
                let v = vals.get(3 + j).copied().unwrap_or(0.0);
                c.attrs_f32.entry((*k).to_string()).or_default().push(v);
            }
        }
    }
    Ok(c)
}

pub fn write_ply_ascii(path: &Path, cloud: &PointSet) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    let keys = cloud.aligned_attr_keys();

    writeln!(w, "ply")?;
    writeln!(w, "format ascii 1.0")?;
    writeln!(w, "element vertex {}", cloud.len())?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;
    for k in &keys {
        writeln!(w, "property float {}", k)?;
    }
    writeln!(w, "end_header")?;

    for i in 0..cloud.len() {
        write!(w, "{} {} {}", cloud.x[i], cloud.y[i], cloud.z[i])?;
        for k in &keys {
            write!(w, " {}", cloud.attrs_f32[k][i])?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Pick a reader from the file extension.
pub fn read_auto(path: &Path) -> Result<PointSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let cloud = match ext.as_str() {
        "ply" => read_ply_ascii(path)?,
        "las" | "laz" => read_las(path)?,
        "xyz" | "txt" | "csv" | "pts" => read_xyz(path)?,
        other => bail!("unsupported point-cloud extension '{other}' (expected .xyz/.txt/.csv/.pts, .ply or .las)"),
    };
    debug!("read {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn xyz_with_header_and_colors() {
        let text = "X Y Z R G B\n0 0 0 255 0 0\n1.5 2 3 0 255 0\n# comment\n\n-1,2,0.5,1,2,3\n";
        let c = parse_xyz(Cursor::new(text)).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.point(2), [-1.0, 2.0, 0.5]);
        assert!(c.has_color());
        assert_eq!(c.attrs_f32["green"], vec![0.0, 255.0, 2.0]);
    }

    #[test]
    fn xyz_without_colors_and_count_header() {
        let c = parse_xyz(Cursor::new("2\n1 2 3\n4 5 6\n")).unwrap();
        assert_eq!(c.len(), 2);
        assert!(!c.has_color());
        assert!(c.attrs_f32.is_empty());
    }

    #[test]
    fn xyz_rejects_short_record_after_data() {
        assert!(parse_xyz(Cursor::new("1 2 3\n4 5\n")).is_err());
    }

    #[test]
    fn ply_round_trip_through_disk() {
        let mut c = PointSet::from_points(&[[0.5, 1.0, 2.0], [3.0, -1.0, 0.0]]);
        for k in COLOR_KEYS { c.attrs_f32.insert(k.into(), vec![10.0, 20.0]); }
        let path = std::env::temp_dir().join(format!("wallnav-io-{}.ply", std::process::id()));
        write_ply_ascii(&path, &c).unwrap();
        let back = read_auto(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.x, c.x);
        assert_eq!(back.z, c.z);
        assert_eq!(back.attrs_f32["blue"], vec![10.0, 20.0]);
    }

    #[test]
    fn las_points_and_intensity() {
        use las::Write as _;
        let path = std::env::temp_dir().join(format!("wallnav-io-{}.las", std::process::id()));
        let mut w = las::Writer::from_path(&path, las::Header::default()).unwrap();
        for (x, i) in [(1.5, 7u16), (-2.25, 9)] {
            w.write(las::Point { x, y: 0.5, z: 3.0, intensity: i, ..Default::default() }).unwrap();
        }
        drop(w);
        let back = read_auto(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.len(), 2);
        assert!((back.x[1] + 2.25).abs() < 1e-3);
        assert!((back.z[0] - 3.0).abs() < 1e-3);
        assert_eq!(back.attrs_f32["intensity"], vec![7.0, 9.0]);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        assert!(read_auto(Path::new("scan.obj")).is_err());
    }
}
