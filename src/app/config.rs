use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::insights::{WindowPolicy, DEFAULT_RESULT_LIMIT};

/// 設定値として受け付ける最大秒数（chrono::Duration のオーバーフロー防止）
const MAX_CONFIG_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// クエリ時間窓の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// ログが検索可能になるまでの遅延（秒）
    #[serde(default = "default_ingestion_lag")]
    pub ingestion_lag_secs: u64,
    /// 初回・カーソル破棄時の窓幅（秒）
    #[serde(default = "default_min_window")]
    pub min_window_secs: u64,
    /// これより古いカーソルは破棄する（秒）
    #[serde(default = "default_max_backfill")]
    pub max_backfill_secs: u64,
}

fn default_ingestion_lag() -> u64 {
    5 * 60
}

fn default_min_window() -> u64 {
    60
}

fn default_max_backfill() -> u64 {
    90 * 60
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            ingestion_lag_secs: default_ingestion_lag(),
            min_window_secs: default_min_window(),
            max_backfill_secs: default_max_backfill(),
        }
    }
}

impl WindowConfig {
    pub fn policy(&self) -> WindowPolicy {
        let secs = |s: u64| chrono::Duration::seconds(s.min(MAX_CONFIG_SECS) as i64);
        WindowPolicy {
            ingestion_lag: secs(self.ingestion_lag_secs),
            // 幅0の窓は作らない
            min_window: secs(self.min_window_secs.max(1)),
            max_backfill: secs(self.max_backfill_secs),
        }
    }
}

/// ポーリング設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// 結果取得の間隔（ミリ秒）
    #[serde(default = "default_poll_interval")]
    pub interval_millis: u64,
    /// 全体のタイムアウト（秒）。未設定ならシグナルまで待つ
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_millis: default_poll_interval(),
            timeout_secs: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// クエリ実行設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// 1クエリで返す最大行数
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    /// AWS CLI コマンド
    #[serde(default = "default_aws_command")]
    pub aws_command: String,
}

fn default_result_limit() -> u32 {
    DEFAULT_RESULT_LIMIT
}

fn default_aws_command() -> String {
    "aws".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            result_limit: default_result_limit(),
            aws_command: default_aws_command(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// カーソルファイルの保存先（未設定時は default_state_dir）
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// 明示されたパスは存在必須。デフォルトパスにファイルがなければデフォルト設定を返す。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let Some(config_path) = Self::config_path() else {
                    return Ok(Self::default());
                };
                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// 設定ファイルパスを取得
    pub fn config_path() -> Option<PathBuf> {
        // ~/.config/check-logs-insights/config.toml を使用
        directories::BaseDirs::new()
            .map(|d| d.home_dir().join(".config/check-logs-insights/config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let policy = config.window.policy();
        assert_eq!(policy, WindowPolicy::default());
        assert_eq!(config.poll.interval(), Duration::from_secs(1));
        assert_eq!(config.poll.timeout(), None);
        assert_eq!(config.query.result_limit, 10);
        assert_eq!(config.query.aws_command, "aws");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [window]
            ingestion_lag_secs = 120

            [poll]
            timeout_secs = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.window.ingestion_lag_secs, 120);
        assert_eq!(config.window.min_window_secs, 60);
        assert_eq!(config.poll.interval_millis, 1000);
        assert_eq!(config.poll.timeout(), Some(Duration::from_secs(50)));
        assert_eq!(config.query, QueryConfig::default());
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config = Config {
            window: WindowConfig {
                min_window_secs: 0,
                ..Default::default()
            },
            poll: PollConfig {
                interval_millis: 0,
                timeout_secs: None,
            },
            ..Default::default()
        };
        assert_eq!(config.window.policy().min_window, chrono::Duration::seconds(1));
        assert_eq!(config.poll.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "state_dir = \"/var/lib/check\"\n[query]\naws_command = \"/usr/local/bin/aws\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.state_dir, Some(PathBuf::from("/var/lib/check")));
        assert_eq!(config.query.aws_command, "/usr/local/bin/aws");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[window\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
