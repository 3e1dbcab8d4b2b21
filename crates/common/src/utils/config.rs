use anyhow::{Context, Result};
use ::config::{Config, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path_str))?;

    settings
        .try_deserialize::<T>()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        limit: u32,
    }

    #[test]
    fn test_load_toml() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "name = \"drip\"\nlimit = 7")?;

        let sample: Sample = load_config(file.path())?;
        assert_eq!(
            sample,
            Sample {
                name: "drip".to_string(),
                limit: 7
            }
        );
        Ok(())
    }

    #[test]
    fn test_missing_file_errors() {
        let result: Result<Sample> = load_config("/definitely/not/here.toml");
        assert!(result.is_err());
    }
}
