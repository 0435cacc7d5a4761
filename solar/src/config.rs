use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use partition::PartitionConfig;

/// Which days (and hours) the solar radiation model integrates over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TimeConfig {
    WholeYear {
        year: i32,
    },
    /// Inclusive range of days of the year
    MultiDays {
        year: i32,
        start_day: u32,
        end_day: u32,
    },
    WithinDay {
        year: i32,
        day: u32,
        start_hour: f64,
        end_hour: f64,
    },
}

impl fmt::Display for TimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeConfig::WholeYear { year } => write!(f, "WholeYear {}", year),
            TimeConfig::MultiDays {
                year,
                start_day,
                end_day,
            } => write!(f, "MultiDays {} {} {}", year, start_day, end_day),
            TimeConfig::WithinDay {
                year,
                day,
                start_hour,
                end_hour,
            } => write!(f, "WithinDay {} {} {} {}", year, day, start_hour, end_hour),
        }
    }
}

/// Everything the solar tools need besides their input datasets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarConfig {
    pub time_config: TimeConfig,
    /// Days between sky sectors
    pub day_interval: u32,
    /// Hours between sky sectors
    pub hour_interval: f64,
    /// Resolution of the viewshed and sky maps
    pub sky_size: u32,
    /// Recorded in project metadata
    pub region: String,
    /// Canopy heights are divided by this before being stacked on the DEM
    pub canopy_divisor: f64,
    pub partition: PartitionConfig,
}

impl Default for SolarConfig {
    fn default() -> Self {
        // July and August
        SolarConfig {
            time_config: TimeConfig::MultiDays {
                year: 2017,
                start_day: 182,
                end_day: 243,
            },
            day_interval: 14,
            hour_interval: 0.5,
            sky_size: 400,
            region: "CRB".to_string(),
            canopy_divisor: 10.0,
            partition: PartitionConfig::default(),
        }
    }
}

impl SolarConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SolarConfig> {
        let path = path.as_ref();
        let raw = fs_err::read_to_string(path)?;
        let config: SolarConfig =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("checking {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.day_interval == 0 {
            bail!("day_interval must be at least 1");
        }
        if !self.hour_interval.is_finite() || self.hour_interval <= 0.0 {
            bail!("hour_interval = {} must be positive", self.hour_interval);
        }
        if self.sky_size == 0 {
            bail!("sky_size must be at least 1");
        }
        if !self.canopy_divisor.is_finite() || self.canopy_divisor == 0.0 {
            bail!("canopy_divisor = {} can't be used", self.canopy_divisor);
        }
        match self.time_config {
            TimeConfig::MultiDays {
                start_day, end_day, ..
            } if start_day == 0 || start_day > end_day || end_day > 366 => {
                bail!("bad day range {}..{}", start_day, end_day);
            }
            TimeConfig::WithinDay {
                start_hour,
                end_hour,
                ..
            } if !(0.0..=24.0).contains(&start_hour) || start_hour >= end_hour || end_hour > 24.0 => {
                bail!("bad hour range {}..{}", start_hour, end_hour);
            }
            _ => {}
        }
        self.partition.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_with_nested_tables() {
        let config: SolarConfig = toml::from_str(
            r#"
day_interval = 7

[time_config]
kind = "WithinDay"
year = 2016
day = 200
start_hour = 6.0
end_hour = 18.0

[partition]
junction_buffer = 60.0
"#,
        )
        .unwrap();
        assert_eq!(config.day_interval, 7);
        assert_eq!(config.sky_size, 400);
        assert_eq!(config.partition.junction_buffer, 60.0);
        assert_eq!(config.partition.point_density, 10.0);
        assert_eq!(config.time_config.to_string(), "WithinDay 2016 200 6 18");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_values() {
        assert_eq!(
            SolarConfig::default().time_config.to_string(),
            "MultiDays 2017 182 243"
        );
        assert!(SolarConfig::default().validate().is_ok());

        let config = SolarConfig {
            time_config: TimeConfig::MultiDays {
                year: 2017,
                start_day: 250,
                end_day: 100,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = SolarConfig::default();
        config.partition.point_density = -3.0;
        assert!(config.validate().is_err());
    }
}
