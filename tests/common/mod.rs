//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::Path;

use churnwatch::ChurnConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Write a Telco-shaped CSV where short tenure and high charges drive churn.
/// The first row has a blank `TotalCharges`, as in the real export.
pub fn write_telco_csv(path: &Path, rows: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from("customerID,gender,tenure,MonthlyCharges,TotalCharges,Churn\n");
    for i in 0..rows {
        let tenure = rng.random_range(0..72u32);
        let monthly: f64 = rng.random_range(18.0..118.0);
        let logit = 1.5 - 0.08 * f64::from(tenure) + 0.02 * (monthly - 65.0);
        let churned = rng.random::<f64>() < 1.0 / (1.0 + (-logit).exp());

        let total = if i == 0 {
            " ".to_string()
        } else {
            format!("{:.2}", f64::from(tenure) * monthly)
        };
        let _ = writeln!(
            csv,
            "{:04}-XYZW,{},{},{:.2},{},{}",
            i,
            if i % 2 == 0 { "Female" } else { "Male" },
            tenure,
            monthly,
            total,
            if churned { "Yes" } else { "No" }
        );
    }
    std::fs::write(path, csv).unwrap();
}

/// Config with every path inside `dir`.
pub fn config_in(dir: &Path) -> ChurnConfig {
    let mut config = ChurnConfig::default();
    config.data.path = dir.join("telco.csv");
    config.registry.root = dir.join("registry");
    config.monitoring.workspace_dir = dir.join("workspace");
    config
}

/// The same paths as [`config_in`], as a TOML file for the binary.
pub fn write_config_toml(dir: &Path) -> std::path::PathBuf {
    let config = config_in(dir);
    let toml = format!(
        "[data]\npath = {:?}\n\n[registry]\nroot = {:?}\n\n[monitoring]\nworkspace_dir = {:?}\n",
        config.data.path.display().to_string(),
        config.registry.root.display().to_string(),
        config.monitoring.workspace_dir.display().to_string(),
    );
    let path = dir.join("churnwatch.toml");
    std::fs::write(&path, toml).unwrap();
    path
}
