use std::fs;
use std::path::Path;

use helpline_core::config::{AppConfig, LoadOptions};
use helpline_core::Order;
use helpline_store::{CatalogStore, VectorIndex};
use serde::Serialize;

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
                error.to_string().replace('"', "\\\"")
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
            checks.push(check_catalog(&config));
            checks.push(check_ledger(&config));
            checks.push(check_index("general_index", &config.data.general_index_path));
            checks.push(check_index("product_index", &config.data.product_index_path));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_file", "ledger_files", "general_index", "product_index"] {
                checks.push(skipped(name));
            }
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

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    match CatalogStore::load(&config.data.catalog_path) {
        Ok(catalog) => DoctorCheck {
            name: "catalog_file",
            status: CheckStatus::Pass,
            details: format!(
                "{} product(s) at {}",
                catalog.len(),
                config.data.catalog_path.display()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "catalog_file", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_ledger(config: &AppConfig) -> DoctorCheck {
    // Once a working copy exists it supersedes the original.
    let path = if config.data.orders_working_copy.exists() {
        &config.data.orders_working_copy
    } else {
        &config.data.orders_path
    };

    let parsed: Result<Vec<Order>, String> = fs::read(path)
        .map_err(|error| error.to_string())
        .and_then(|raw| serde_json::from_slice(&raw).map_err(|error| error.to_string()));
    match parsed {
        Ok(orders) => DoctorCheck {
            name: "ledger_files",
            status: CheckStatus::Pass,
            details: format!("{} order(s) at {}", orders.len(), path.display()),
        },
        Err(details) => DoctorCheck {
            name: "ledger_files",
            status: CheckStatus::Fail,
            details: format!("{}: {details}", path.display()),
        },
    }
}

fn check_index(name: &'static str, path: &Path) -> DoctorCheck {
    match VectorIndex::load(path) {
        Ok(index) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("{} record(s) at {}", index.len(), path.display()),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let label = match check.status {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "SKIP",
        };
        lines.push(format!("  [{label}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
