use secrecy::ExposeSecret;
use serde::Serialize;

use approflow_core::config::{AppConfig, LoadOptions, StampModeConfig};
use approflow_db::connect_with_config;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_stamp_key(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "stamp_key_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_stamp_key(config: &AppConfig) -> DoctorCheck {
    match (config.stamp.mode, &config.stamp.signing_key) {
        (StampModeConfig::Digest, _) => DoctorCheck {
            name: "stamp_key_readiness",
            status: CheckStatus::Pass,
            details: "digest mode requires no signing key".to_string(),
        },
        (StampModeConfig::Hmac, Some(key)) if !key.expose_secret().trim().is_empty() => {
            DoctorCheck {
                name: "stamp_key_readiness",
                status: CheckStatus::Pass,
                details: "hmac signing key present".to_string(),
            }
        }
        (StampModeConfig::Hmac, _) => DoctorCheck {
            name: "stamp_key_readiness",
            status: CheckStatus::Fail,
            details: "hmac mode configured without a signing key".to_string(),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use approflow_core::config::{AppConfig, StampModeConfig};

    use super::{check_stamp_key, CheckStatus};

    #[test]
    fn digest_mode_passes_without_a_key() {
        let config = AppConfig::default();
        let check = check_stamp_key(&config);
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[test]
    fn hmac_mode_without_a_key_fails() {
        let mut config = AppConfig::default();
        config.stamp.mode = StampModeConfig::Hmac;
        config.stamp.signing_key = None;
        let check = check_stamp_key(&config);
        assert_eq!(check.status, CheckStatus::Fail);

        config.stamp.signing_key = Some(SecretString::from("shared-key"));
        let check = check_stamp_key(&config);
        assert_eq!(check.status, CheckStatus::Pass);
    }
}
