use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::types::RunConfig;
use crate::variable::{Constants, VariableResolver};
use crate::{CaserunError, Result};

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "caserun.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CaserunError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CaserunError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// 加载配置；显式路径优先，否则自动查找，找不到时使用默认配置
    pub fn load(explicit: Option<&Path>) -> Result<RunConfig> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        match path {
            Some(path) => {
                info!(path = %path.display(), "loading config");
                Self::load_from_path(path)
            }
            None => {
                debug!("no config file found, using defaults");
                Ok(RunConfig::default())
            }
        }
    }

    /// 查找配置文件
    /// 查找顺序：
    /// 1. 当前目录
    /// 2. 父目录递归查找
    /// 3. 用户配置目录 ~/.config/caserun/
    pub fn find_config_file() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_upwards(&dir))
            .or_else(Self::user_config_file)
    }

    /// 从给定目录向上查找
    pub fn find_upwards(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(Self::CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn user_config_file() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let path = home.join(".config").join("caserun").join(Self::CONFIG_FILE);
        path.is_file().then_some(path)
    }

    /// 构建常量池
    /// env_name: 环境名称（如 "dev", "prod"）
    /// cli_vars: CLI 传入的变量覆盖（--var key=value）
    pub fn build_constants(
        config: &RunConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Result<Constants> {
        let mut constants = Constants::new();

        // 1. 从配置文件加载环境变量
        if let Some(name) = env_name {
            let env = config.get_environment(name).ok_or_else(|| {
                CaserunError::ConfigError(format!("Unknown environment: {}", name))
            })?;
            for (key, value) in &env.variables {
                // 解析系统环境变量 ${VAR}
                constants.insert(key.clone(), VariableResolver::resolve_env_vars(value));
            }
        }

        // 2. 应用 CLI 覆盖（优先级最高）
        for (key, value) in cli_vars {
            constants.insert(key.clone(), value.clone());
        }

        Ok(constants)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_from_path() {
        let config_content = r#"
[engine]
base_url = "http://localhost:8080"

[environments.dev]
api_key = "dev-key"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = ConfigLoader::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.environments.len(), 1);
        assert_eq!(config.engine.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[engine\nbroken").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_path(temp_file.path()),
            Err(CaserunError::ConfigError(_))
        ));
    }

    #[test]
    fn test_find_upwards() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("caserun.toml"), "").unwrap();

        let found = ConfigLoader::find_upwards(&nested).unwrap();
        assert_eq!(found, root.path().join("caserun.toml"));
    }

    #[test]
    fn test_build_constants() {
        let config_content = r#"
[environments.dev]
base_url = "http://localhost:8080"
token = "dev-token"

[environments.prod]
base_url = "https://api.example.com"
token = "${CASERUN_SURELY_UNSET_VAR}"
"#;

        let config: RunConfig = toml::from_str(config_content).unwrap();

        let constants = ConfigLoader::build_constants(&config, Some("dev"), &[]).unwrap();
        assert_eq!(constants.get("base_url"), Some("http://localhost:8080"));
        assert_eq!(constants.get("token"), Some("dev-token"));

        // 未设置的环境变量保持原样
        let constants = ConfigLoader::build_constants(&config, Some("prod"), &[]).unwrap();
        assert_eq!(constants.get("token"), Some("${CASERUN_SURELY_UNSET_VAR}"));

        // CLI 覆盖
        let cli_vars = vec![("token".to_string(), "custom-token".to_string())];
        let constants = ConfigLoader::build_constants(&config, Some("dev"), &cli_vars).unwrap();
        assert_eq!(constants.get("token"), Some("custom-token"));

        assert!(ConfigLoader::build_constants(&config, Some("staging"), &[]).is_err());
    }

    #[test]
    fn test_parse_cli_var() {
        assert_eq!(
            ConfigLoader::parse_cli_var("key=value"),
            Some(("key".to_string(), "value".to_string()))
        );

        assert_eq!(
            ConfigLoader::parse_cli_var("url=https://example.com?a=b"),
            Some(("url".to_string(), "https://example.com?a=b".to_string()))
        );

        assert_eq!(ConfigLoader::parse_cli_var("invalid"), None);
        assert_eq!(ConfigLoader::parse_cli_var("=value"), None);
    }
}
