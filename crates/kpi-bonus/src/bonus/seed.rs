//! Reference configuration installed into an empty store.

use std::collections::HashMap;

use tracing::info;

use super::domain::{CalculationType, NewDepartment, NewKpiDefinition, NewLocation, NewManager};
use super::evaluation::{ThresholdDraft, ThresholdOperator};
use super::repository::{DirectoryStore, RepositoryError, ThresholdStore};

const DEPARTMENTS: [&str; 2] = ["Bouda", "Bistro"];

const LOCATIONS: [(&str, &str); 3] = [
    ("Mercury", "Bouda"),
    ("OC4Dvory", "Bouda"),
    ("Bistro", "Bistro"),
];

const MANAGERS: [(&str, &str); 3] = [
    ("Matěj", "Bouda"),
    ("Thomas", "Bouda"),
    ("Michael", "Bistro"),
];

struct KpiSeed {
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    calculation: CalculationType,
}

const KPIS: [KpiSeed; 10] = [
    KpiSeed {
        name: "Audit",
        description: "Operational audit (%)",
        unit: "%",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Delivery rating",
        description: "Customer rating of deliveries (stars)",
        unit: "★",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Google rating",
        description: "Google review rating (stars)",
        unit: "★",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Preparation time",
        description: "Average order preparation time (min)",
        unit: "min",
        calculation: CalculationType::LowerIsBetter,
    },
    KpiSeed {
        name: "Order error rate",
        description: "Share of faulty orders (%)",
        unit: "%",
        calculation: CalculationType::LowerIsBetter,
    },
    KpiSeed {
        name: "Mystery shop",
        description: "Mystery shopping score (%)",
        unit: "%",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Revenue per hour",
        description: "Revenue per worked hour (CZK/h)",
        unit: "CZK/h",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Staff rating",
        description: "Internal team rating (0-10)",
        unit: "0-10",
        calculation: CalculationType::HigherIsBetter,
    },
    KpiSeed {
        name: "Detected loss",
        description: "Detected loss of goods (%)",
        unit: "%",
        calculation: CalculationType::LowerIsBetter,
    },
    KpiSeed {
        name: "Undetected loss",
        description: "Undetected loss of goods (%)",
        unit: "%",
        calculation: CalculationType::LowerIsBetter,
    },
];

fn threshold_drafts() -> Vec<(&'static str, ThresholdDraft)> {
    use ThresholdOperator::{AtLeast, AtMost, Below, Between};

    vec![
        (
            "Audit",
            ThresholdDraft::new(AtLeast, 30.0).lower(85.0).order(1).describe(">=85%"),
        ),
        (
            "Audit",
            ThresholdDraft::new(Between, 15.0)
                .lower(75.0)
                .upper(84.99)
                .order(2)
                .describe("75-84%"),
        ),
        (
            "Audit",
            ThresholdDraft::new(Below, 0.0).upper(75.0).order(3).describe("<75%"),
        ),
        (
            "Delivery rating",
            ThresholdDraft::new(AtLeast, 10.0).lower(4.6).describe(">=4.6"),
        ),
        (
            "Google rating",
            ThresholdDraft::new(AtLeast, 5.0).lower(4.6).describe(">=4.6"),
        ),
        (
            "Preparation time",
            ThresholdDraft::new(AtMost, 10.0).upper(10.0).describe("<=10 min"),
        ),
        (
            "Order error rate",
            ThresholdDraft::new(Below, 10.0).upper(0.5).describe("<0.5%"),
        ),
        (
            "Mystery shop",
            ThresholdDraft::new(AtLeast, 15.0).lower(85.0).describe(">=85%"),
        ),
        (
            "Revenue per hour",
            ThresholdDraft::new(AtLeast, 5.0).lower(1250.0).describe(">=1250 CZK/h"),
        ),
        (
            "Staff rating",
            ThresholdDraft::new(AtLeast, 5.0).lower(8.0).describe(">=8/10"),
        ),
        (
            "Detected loss",
            ThresholdDraft::new(AtMost, 5.0).upper(0.5).describe("<=0.5%"),
        ),
        (
            "Undetected loss",
            ThresholdDraft::new(AtMost, 5.0).upper(0.5).describe("<=0.5%"),
        ),
    ]
}

/// Installs the reference departments, locations, managers, KPIs and rules.
///
/// Returns `false` without touching the store when any department already exists.
pub fn install_defaults<S>(store: &S) -> Result<bool, RepositoryError>
where
    S: DirectoryStore + ThresholdStore + ?Sized,
{
    if !store.departments()?.is_empty() {
        info!("store already configured, reference data not installed");
        return Ok(false);
    }

    let mut departments = HashMap::new();
    for name in DEPARTMENTS {
        let department = store.insert_department(NewDepartment {
            name: name.to_string(),
            ..NewDepartment::default()
        })?;
        departments.insert(name, department.id);
    }

    for (name, department) in LOCATIONS {
        if let Some(&department_id) = departments.get(department) {
            store.insert_location(NewLocation {
                name: name.to_string(),
                department_id,
                description: None,
            })?;
        }
    }

    for (name, department) in MANAGERS {
        if let Some(&department_id) = departments.get(department) {
            store.insert_manager(NewManager {
                name: name.to_string(),
                department_id,
                email: None,
            })?;
        }
    }

    let mut kpis = HashMap::new();
    for (position, seed) in (1u32..).zip(KPIS.iter()) {
        let kpi = store.insert_kpi(NewKpiDefinition {
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            unit: Some(seed.unit.to_string()),
            calculation: Some(seed.calculation),
            display_order: Some(position),
        })?;
        kpis.insert(seed.name, kpi.id);
    }

    let mut rules = 0;
    for (kpi_name, draft) in threshold_drafts() {
        if let Some(&kpi_id) = kpis.get(kpi_name) {
            store.insert_threshold(kpi_id, draft)?;
            rules += 1;
        }
    }

    info!(
        departments = departments.len(),
        kpis = kpis.len(),
        rules,
        "reference configuration installed"
    );
    Ok(true)
}
