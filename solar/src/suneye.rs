//! Compiles field measurements from SunEye skyview samples into one average net insolation per
//! monitoring site, for July 1 through August 31.
//!
//! The input directory holds one subdirectory per site, each with a pair of CSV exports per
//! skyview sample: `SkyNNDailySolarAccess.csv` and `SkyNNInsolation.csv`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

const ACCESS_SUFFIX: &str = "DailySolarAccess.csv";
const INSOLATION_SUFFIX: &str = "Insolation.csv";
const PREFIX_LEN: usize = 5;

// Days 1 through 31 of the daily solar access table, for the July and August columns
const ACCESS_ROWS: std::ops::Range<usize> = 14..45;
const ACCESS_COLUMNS: [usize; 2] = [8, 9];
// July 1 through August 31 of the insolation table, one column per time of day
const INSOLATION_ROWS: std::ops::Range<usize> = 199..261;
const INSOLATION_COLUMNS: std::ops::Range<usize> = 1..63;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SiteSolar {
    #[serde(rename = "Site_Name")]
    pub site: String,
    #[serde(rename = "Avg_Sol")]
    pub average: f64,
}

/// Every site in `dir`, sorted by name. Sites without any skyview samples are skipped.
pub fn compile_sites(dir: &Path) -> Result<Vec<SiteSolar>> {
    let mut site_dirs: Vec<PathBuf> = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            site_dirs.push(entry.path());
        }
    }
    site_dirs.sort();

    let mut results = Vec::new();
    for site_dir in site_dirs {
        let site = site_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        match site_average(&site_dir).with_context(|| format!("site {}", site))? {
            Some(average) => results.push(SiteSolar { site, average }),
            None => warn!("{} has no skyview samples, skipping", site_dir.display()),
        }
    }
    Ok(results)
}

/// The mean over this site's skyview samples of their total net insolation
pub fn site_average(site_dir: &Path) -> Result<Option<f64>> {
    let prefixes = skyview_prefixes(site_dir)?;
    if prefixes.is_empty() {
        return Ok(None);
    }
    let mut totals = Vec::new();
    for prefix in &prefixes {
        let access = solar_access(&site_dir.join(format!("{}{}", prefix, ACCESS_SUFFIX)))?;
        let gross = gross_insolation(&site_dir.join(format!("{}{}", prefix, INSOLATION_SUFFIX)))?;
        totals.push(net_insolation(&gross, &access).iter().sum::<f64>());
    }
    debug!(
        "{}: skyview totals {:?}",
        site_dir.display(),
        totals
    );
    Ok(Some(totals.iter().sum::<f64>() / totals.len() as f64))
}

/// Sample names like `Sky01`, from the first few characters of every file in the site
pub fn skyview_prefixes(site_dir: &Path) -> Result<Vec<String>> {
    let mut prefixes = BTreeSet::new();
    for entry in fs_err::read_dir(site_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(prefix) = name.get(..PREFIX_LEN) {
            prefixes.insert(prefix.to_string());
        }
    }
    Ok(prefixes.into_iter().collect())
}

/// Percent solar access per day: all of July, then all of August
pub fn solar_access(path: &Path) -> Result<Vec<f64>> {
    let rows = read_rows(path)?;
    let mut values = Vec::new();
    for col in ACCESS_COLUMNS {
        for row in ACCESS_ROWS {
            let cell = rows
                .get(row)
                .and_then(|r| r.get(col))
                .ok_or_else(|| anyhow!("{} has no row {} column {}", path.display(), row, col))?;
            values.push(cell.trim().parse::<f64>().with_context(|| {
                format!(
                    "{} row {} column {} = {:?}",
                    path.display(),
                    row,
                    col,
                    cell
                )
            })?);
        }
    }
    Ok(values)
}

/// Total insolation per day, summed over the time-of-day columns. Blank cells count as 0.
pub fn gross_insolation(path: &Path) -> Result<Vec<f64>> {
    let rows = read_rows(path)?;
    if rows.len() < INSOLATION_ROWS.end {
        bail!(
            "{} has {} rows, but needs {}",
            path.display(),
            rows.len(),
            INSOLATION_ROWS.end
        );
    }
    let mut values = Vec::new();
    for row in &rows[INSOLATION_ROWS] {
        let mut total = 0.0;
        for cell in row
            .iter()
            .skip(INSOLATION_COLUMNS.start)
            .take(INSOLATION_COLUMNS.len())
        {
            let cell = cell.trim();
            if !cell.is_empty() {
                total += cell
                    .parse::<f64>()
                    .with_context(|| format!("{}: {:?}", path.display(), cell))?;
            }
        }
        values.push(total);
    }
    Ok(values)
}

/// Gross insolation scaled by the percent of sky that's open, day by day
pub fn net_insolation(gross: &[f64], access: &[f64]) -> Vec<f64> {
    gross
        .iter()
        .zip(access.iter())
        .map(|(g, a)| g * a / 100.0)
        .collect()
}

pub fn write_csv(path: &Path, sites: &[SiteSolar]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(fs_err::File::create(path)?);
    if sites.is_empty() {
        writer.write_record(["Site_Name", "Avg_Sol"])?;
    }
    for site in sites {
        writer.serialize(site)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(fs_err::File::open(path)?);
    let mut rows = Vec::new();
    for rec in reader.records() {
        rows.push(rec.with_context(|| format!("reading {}", path.display()))?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A daily solar access export: 14 header rows, then one row per day with a column per month
    fn access_csv(july: f64, august: f64) -> String {
        let mut out = String::new();
        for i in 0..14 {
            out.push_str(&format!("header {}\n", i));
        }
        for day in 1..=31 {
            out.push_str(&format!(
                "{},0,0,0,0,0,0,0,{},{},0,0,0\n",
                day, july, august
            ));
        }
        out
    }

    // An insolation export with `per_cell` in every time-of-day cell for the summer rows, and one
    // blank cell per row
    fn insolation_csv(per_cell: f64) -> String {
        let mut out = String::new();
        for i in 0..199 {
            out.push_str(&format!("junk {}\n", i));
        }
        for day in 0..62 {
            let mut row = vec![format!("day{}", day)];
            for col in 1..63 {
                row.push(if col == 5 {
                    String::new()
                } else {
                    per_cell.to_string()
                });
            }
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out.push_str("trailer\n");
        out
    }

    #[test]
    fn net_insolation_per_site() {
        let dir = tempfile::tempdir().unwrap();
        let site_a = dir.path().join("CBW05583-028079");
        let site_b = dir.path().join("CBW05583-100000");
        fs_err::create_dir_all(&site_a).unwrap();
        fs_err::create_dir_all(&site_b).unwrap();
        fs_err::create_dir_all(dir.path().join("empty")).unwrap();
        fs_err::write(dir.path().join("notes.txt"), "not a site").unwrap();

        fs_err::write(site_a.join("Sky01DailySolarAccess.csv"), access_csv(50.0, 50.0)).unwrap();
        fs_err::write(site_a.join("Sky01Insolation.csv"), insolation_csv(1.0)).unwrap();
        fs_err::write(site_a.join("Sky02DailySolarAccess.csv"), access_csv(100.0, 100.0))
            .unwrap();
        fs_err::write(site_a.join("Sky02Insolation.csv"), insolation_csv(1.0)).unwrap();
        fs_err::write(site_b.join("Sky01DailySolarAccess.csv"), access_csv(10.0, 20.0)).unwrap();
        fs_err::write(site_b.join("Sky01Insolation.csv"), insolation_csv(2.0)).unwrap();

        assert_eq!(
            skyview_prefixes(&site_a).unwrap(),
            vec!["Sky01".to_string(), "Sky02".to_string()]
        );
        let access = solar_access(&site_b.join("Sky01DailySolarAccess.csv")).unwrap();
        assert_eq!(access.len(), 62);
        assert_eq!(access[0], 10.0);
        assert_eq!(access[31], 20.0);
        let gross = gross_insolation(&site_a.join("Sky01Insolation.csv")).unwrap();
        assert_eq!(gross.len(), 62);
        // 62 time-of-day columns, one blank
        assert_eq!(gross[0], 61.0);

        let sites = compile_sites(dir.path()).unwrap();
        assert_eq!(sites.len(), 2);
        // Sky01: 62 days * 61 * 0.5, Sky02: 62 days * 61 * 1.0
        assert_eq!(sites[0].site, "CBW05583-028079");
        assert!((sites[0].average - (1891.0 + 3782.0) / 2.0).abs() < 1e-9);
        // Site B only averages its own sample. July: 31 * 122 * 0.1, August: 31 * 122 * 0.2
        assert!((sites[1].average - (378.2 + 756.4)).abs() < 1e-9);

        let out = dir.path().join("out.csv");
        write_csv(&out, &sites).unwrap();
        let written = fs_err::read_to_string(&out).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("Site_Name,Avg_Sol"));
        assert_eq!(lines.next(), Some("CBW05583-028079,2836.5"));
    }

    #[test]
    fn short_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sky01Insolation.csv");
        fs_err::write(&path, "a,b\n1,2\n").unwrap();
        assert!(gross_insolation(&path).is_err());
        assert!(solar_access(&path).is_err());
    }
}
