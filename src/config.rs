// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::error::ErrorReport;
use crate::error::Fallible;

/// The optional configuration file in the data directory.
pub const CONFIG_FILE: &str = "kanjidrill.toml";

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite file name, relative to the data directory.
    pub database: String,
    /// Default log filter, used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "kanjidrill.db".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Read `kanjidrill.toml` from `directory`. A missing file means the
    /// defaults.
    pub fn load(directory: &Path) -> Fallible<Self> {
        let path = directory.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = read_to_string(&path)?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Fallible<Self> {
        toml::from_str(text)
            .map_err(|e| ErrorReport::new(format!("Failed to parse {CONFIG_FILE}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use super::*;
    use crate::helper::create_tmp_directory;

    #[test]
    fn test_missing_file_is_default() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        assert_eq!(Config::load(&dir)?, Config::default());
        Ok(())
    }

    #[test]
    fn test_partial_file() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        write(dir.join(CONFIG_FILE), "database = \"drill.sqlite\"\n")?;
        let config = Config::load(&dir)?;
        assert_eq!(config.database, "drill.sqlite");
        assert_eq!(config.log_level, "warn");
        Ok(())
    }

    #[test]
    fn test_unknown_key() {
        let result = Config::parse("colour = \"red\"\n");
        assert!(result.is_err());
    }
}
