//! Grouped aggregates to wide rows.

use std::collections::BTreeMap;

use greenspace_models::{GroupedAggregate, LandUseCode, LandUseSchema, OutputRow};
use serde::{Deserialize, Serialize};

use crate::ExportError;

/// What to do with a land-use code that is not in the year's schema.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchemaPolicy {
    /// Drop the code's area with a warning and record it.
    #[default]
    Log,
    /// Fail the table with [`ExportError::SchemaMismatch`].
    Reject,
}

/// Code-to-area mapping for one tract at one threshold, built by a single
/// pass over its groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandUseAreas {
    areas: BTreeMap<LandUseCode, f64>,
}

impl LandUseAreas {
    /// Folds a grouped aggregate into a mapping. Repeated codes are summed.
    #[must_use]
    pub fn from_aggregate(aggregate: &GroupedAggregate) -> Self {
        let mut areas = BTreeMap::new();
        for group in &aggregate.groups {
            *areas.entry(group.code).or_insert(0.0) += group.area_m2;
        }
        Self { areas }
    }

    /// Area for `code`; `0.0` when the tract has none.
    #[must_use]
    pub fn get(&self, code: LandUseCode) -> f64 {
        self.areas.get(&code).copied().unwrap_or(0.0)
    }

    /// Iterates `(code, area)` in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (LandUseCode, f64)> + '_ {
        self.areas.iter().map(|(c, a)| (*c, *a))
    }
}

/// A flattened table ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTable {
    /// Land-use column names in schema order (without `cluster_id`).
    pub columns: Vec<String>,
    /// One row per tract, in input order.
    pub rows: Vec<OutputRow>,
    /// Area per code found outside the schema, summed over all tracts.
    pub unknown_codes: BTreeMap<LandUseCode, f64>,
}

impl FlatTable {
    /// Total area dropped because its code is outside the schema.
    #[must_use]
    pub fn unknown_area(&self) -> f64 {
        self.unknown_codes.values().sum()
    }
}

/// Flattens aggregates into rows with one value per schema code.
///
/// # Errors
///
/// Returns [`ExportError::SchemaMismatch`] for the first out-of-schema
/// code when `policy` is [`SchemaPolicy::Reject`].
pub fn flatten_table(
    aggregates: &[GroupedAggregate],
    schema: &LandUseSchema,
    policy: SchemaPolicy,
) -> Result<FlatTable, ExportError> {
    let mut rows = Vec::with_capacity(aggregates.len());
    let mut unknown_codes: BTreeMap<LandUseCode, f64> = BTreeMap::new();

    for aggregate in aggregates {
        let areas = LandUseAreas::from_aggregate(aggregate);

        for (code, area) in areas.iter().filter(|(code, _)| !schema.contains(*code)) {
            match policy {
                SchemaPolicy::Reject => {
                    return Err(ExportError::SchemaMismatch {
                        year: schema.year,
                        cluster_id: aggregate.cluster_id.clone(),
                        code,
                    });
                }
                SchemaPolicy::Log => {
                    *unknown_codes.entry(code).or_insert(0.0) += area;
                }
            }
        }

        rows.push(OutputRow {
            cluster_id: aggregate.cluster_id.clone(),
            values: schema.codes.iter().map(|code| areas.get(*code)).collect(),
        });
    }

    for (code, area) in &unknown_codes {
        log::warn!(
            "Dropped {area} m² of land-use code {code}, which is not in the {} schema",
            schema.year
        );
    }

    Ok(FlatTable {
        columns: schema.columns(),
        rows,
        unknown_codes,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use greenspace_models::{ImageryProfile, LandUseArea};

    pub fn schema() -> LandUseSchema {
        LandUseSchema {
            year: 1990,
            name: "test".to_string(),
            attribute: "LANDUSE".to_string(),
            column_prefix: "LANDUSE".to_string(),
            codes: vec![LandUseCode(3100), LandUseCode(1110), LandUseCode(9999)],
            imagery: ImageryProfile {
                collection: "LT05".to_string(),
                tag: "L5".to_string(),
                nir_band: "B4".to_string(),
                red_band: "B3".to_string(),
                window_start: chrono::NaiveDate::from_ymd_opt(1990, 6, 1).unwrap(),
                window_end: chrono::NaiveDate::from_ymd_opt(1990, 8, 31).unwrap(),
                reference_scene: "LT05_022031_19900712".to_string(),
            },
        }
    }

    pub fn aggregate(id: &str, groups: &[(u32, f64)]) -> GroupedAggregate {
        GroupedAggregate {
            cluster_id: id.to_string(),
            groups: groups
                .iter()
                .map(|(code, area_m2)| LandUseArea {
                    code: LandUseCode(*code),
                    area_m2: *area_m2,
                })
                .collect(),
        }
    }

    #[test]
    fn values_follow_schema_order_with_zeros() {
        let table = flatten_table(
            &[aggregate("T1", &[(1110, 900.0), (9999, 1800.0)])],
            &schema(),
            SchemaPolicy::Log,
        )
        .unwrap();
        assert_eq!(
            table.columns,
            vec!["LANDUSE3100", "LANDUSE1110", "LANDUSE9999"]
        );
        assert_eq!(table.rows[0].values, vec![0.0, 900.0, 1800.0]);
    }

    #[test]
    fn empty_aggregate_is_all_zero_row() {
        let table = flatten_table(&[aggregate("EMPTY", &[])], &schema(), SchemaPolicy::Log).unwrap();
        assert_eq!(table.rows[0].cluster_id, "EMPTY");
        assert_eq!(table.rows[0].values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn unknown_codes_are_dropped_not_merged() {
        let table = flatten_table(
            &[
                aggregate("T1", &[(1110, 900.0), (1111, 450.0)]),
                aggregate("T2", &[(1111, 900.0)]),
            ],
            &schema(),
            SchemaPolicy::Log,
        )
        .unwrap();
        assert_eq!(table.rows[0].values, vec![0.0, 900.0, 0.0]);
        assert_eq!(table.rows[1].values, vec![0.0, 0.0, 0.0]);
        assert!((table.unknown_area() - 1350.0).abs() < f64::EPSILON);
        assert_eq!(table.unknown_codes.len(), 1);
    }

    #[test]
    fn reject_policy_fails_on_unknown_code() {
        let err = flatten_table(
            &[aggregate("T9", &[(1111, 450.0)])],
            &schema(),
            SchemaPolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ExportError::SchemaMismatch { year: 1990, code: LandUseCode(1111), .. }
        ));
    }

    #[test]
    fn repeated_codes_are_summed() {
        let areas = LandUseAreas::from_aggregate(&aggregate("T", &[(1110, 1.5), (1110, 2.5)]));
        assert!((areas.get(LandUseCode(1110)) - 4.0).abs() < f64::EPSILON);
        assert!(areas.get(LandUseCode(3100)).abs() < f64::EPSILON);
    }

    #[test]
    fn policy_display_is_lowercase() {
        assert_eq!(SchemaPolicy::Log.to_string(), "log");
        assert_eq!(SchemaPolicy::Reject.to_string(), "reject");
        assert_eq!(SchemaPolicy::default(), SchemaPolicy::Log);
    }
}
