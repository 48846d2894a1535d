//! Aggregate figures for the admin dashboard.

use std::collections::BTreeMap;

use chrono::Timelike;
use housing_shared::constants::NOMINAL_BED_CAPACITY;
use housing_shared::{Application, ApplicationStatus, Gender};
use serde::Serialize;

use crate::backend::StorageBackend;
use crate::vault::Vault;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenderCounts {
    pub male: usize,
    pub female: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeStats {
    pub count: usize,
    pub average_gpa: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    /// Mean GPA; 0 when the vault is empty.
    pub average_gpa: f64,
    pub gender_counts: GenderCounts,
    pub province_counts: BTreeMap<String, usize>,
    pub specialization_counts: BTreeMap<String, usize>,
    pub status_counts: BTreeMap<ApplicationStatus, usize>,
    pub colleges: BTreeMap<String, CollegeStats>,
    /// Registrations per UTC hour of day.
    pub hourly_registrations: [usize; 24],
    pub total_fees: u64,
    /// Share of the nominal bed capacity taken, in percent.
    pub occupancy_rate: f64,
}

impl Statistics {
    pub fn from_applications(applications: &[Application]) -> Self {
        let mut stats = Statistics {
            total: applications.len(),
            ..Default::default()
        };
        let mut gpa_sum = 0.0;
        let mut college_sums: BTreeMap<String, f64> = BTreeMap::new();

        for app in applications {
            let gpa = usable_gpa(app.form.gpa);
            gpa_sum += gpa;

            match app.form.gender {
                Gender::Male => stats.gender_counts.male += 1,
                Gender::Female => stats.gender_counts.female += 1,
            }

            *stats
                .province_counts
                .entry(app.form.province.name().to_string())
                .or_default() += 1;
            *stats
                .specialization_counts
                .entry(app.form.specialization.name().to_string())
                .or_default() += 1;
            *stats.status_counts.entry(app.status).or_default() += 1;

            let college = app.form.specialization.college().to_string();
            stats.colleges.entry(college.clone()).or_default().count += 1;
            *college_sums.entry(college).or_default() += gpa;

            stats.hourly_registrations[app.registration_date.hour() as usize] += 1;
            stats.total_fees += u64::from(app.fees);
        }

        if stats.total > 0 {
            stats.average_gpa = gpa_sum / stats.total as f64;
        }
        for (college, entry) in stats.colleges.iter_mut() {
            entry.average_gpa = college_sums[college] / entry.count as f64;
        }
        stats.occupancy_rate = stats.total as f64 * 100.0 / NOMINAL_BED_CAPACITY as f64;

        stats
    }
}

// Non-finite GPAs count as zero instead of poisoning the mean.
fn usable_gpa(gpa: f64) -> f64 {
    if gpa.is_finite() {
        gpa
    } else {
        0.0
    }
}

impl<B: StorageBackend> Vault<B> {
    pub fn statistics(&self) -> Statistics {
        Statistics::from_applications(self.list())
    }
}
