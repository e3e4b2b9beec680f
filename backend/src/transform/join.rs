//! Geo joiner: attach boundary geometry to decoded records by key field.
//!
//! Each record is compared against the geometry source in collection order and
//! takes the geometry of the FIRST matching feature. Values are compared the
//! way they would be after string interpolation, with an optional prefix on
//! either side:
//!
//! | geo prefix | sdmx prefix | match when                                   |
//! |------------|-------------|----------------------------------------------|
//! | set        | set         | `gp + geo == sp + sdmx` (both as text)       |
//! | set        | -           | `gp + geo == sdmx` (sdmx must be a string)   |
//! | -          | set         | `geo == sp + sdmx` (geo must be a string)    |
//! | -          | -           | `geo == sdmx`, strict (no type coercion)     |
//!
//! Matches are cached per call by the text of the record value, so repeated
//! keys share one `Arc` geometry. The scan is linear: cost grows with
//! records x features for distinct keys.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::JoinError;
use crate::models::{Feature, FeatureCollection};

/// Join fields and prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSpec {
    pub geo_field: String,
    pub geo_prefix: Option<String>,
    pub sdmx_field: String,
    pub sdmx_prefix: Option<String>,
}

impl JoinSpec {
    /// Empty prefixes count as unset.
    pub fn new(
        geo_field: impl Into<String>,
        geo_prefix: Option<String>,
        sdmx_field: impl Into<String>,
        sdmx_prefix: Option<String>,
    ) -> Self {
        Self {
            geo_field: geo_field.into(),
            geo_prefix: geo_prefix.filter(|p| !p.is_empty()),
            sdmx_field: sdmx_field.into(),
            sdmx_prefix: sdmx_prefix.filter(|p| !p.is_empty()),
        }
    }
}

/// Joined records with match counts. Every input record is returned, in order.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub records: Vec<Feature>,
    /// Records that found a matching feature in this join.
    pub matched: usize,
    /// Records returned without geometry. A record that already carried
    /// geometry and finds no match here keeps it and is not counted.
    pub unmatched: usize,
}

/// Attach geometry to every record with a matching feature.
pub fn join(geometry: &FeatureCollection, records: Vec<Feature>, spec: &JoinSpec) -> JoinResult {
    let mut joiner = Joiner::new(geometry, spec);
    let records: Vec<Feature> = records
        .into_iter()
        .map(|mut record| {
            joiner.attach(&mut record);
            record
        })
        .collect();
    joiner.finish(records)
}

/// Same as [`join`], checking `cancel` before each record.
pub fn join_cancellable(
    geometry: &FeatureCollection,
    records: Vec<Feature>,
    spec: &JoinSpec,
    cancel: &AtomicBool,
) -> Result<JoinResult, JoinError> {
    let mut joiner = Joiner::new(geometry, spec);
    let mut joined = Vec::with_capacity(records.len());

    for mut record in records {
        if cancel.load(Ordering::Relaxed) {
            return Err(JoinError::Cancelled {
                processed: joined.len(),
            });
        }
        joiner.attach(&mut record);
        joined.push(record);
    }

    Ok(joiner.finish(joined))
}

struct Joiner<'a> {
    geometry: &'a FeatureCollection,
    spec: &'a JoinSpec,
    cache: HashMap<String, Arc<Value>>,
    matched: usize,
}

impl<'a> Joiner<'a> {
    fn new(geometry: &'a FeatureCollection, spec: &'a JoinSpec) -> Self {
        Self {
            geometry,
            spec,
            cache: HashMap::new(),
            matched: 0,
        }
    }

    fn attach(&mut self, record: &mut Feature) {
        let sdmx_value = record.property(&self.spec.sdmx_field);
        let cache_key = interpolate(sdmx_value);

        if let Some(shared) = self.cache.get(&cache_key) {
            record.geometry = Some(Arc::clone(shared));
            self.matched += 1;
            return;
        }

        let geometry = self.geometry;
        let first = geometry
            .features
            .iter()
            .find(|candidate| self.matches(candidate.property(&self.spec.geo_field), sdmx_value));

        if let Some(shared) = first.and_then(|f| f.geometry.as_ref()) {
            self.cache.insert(cache_key, Arc::clone(shared));
            record.geometry = Some(Arc::clone(shared));
            self.matched += 1;
        }
    }

    fn matches(&self, geo: Option<&Value>, sdmx: Option<&Value>) -> bool {
        match (&self.spec.geo_prefix, &self.spec.sdmx_prefix) {
            (Some(gp), Some(sp)) => {
                format!("{}{}", gp, interpolate(geo)) == format!("{}{}", sp, interpolate(sdmx))
            }
            (Some(gp), None) => match sdmx {
                Some(Value::String(s)) => format!("{}{}", gp, interpolate(geo)) == *s,
                _ => false,
            },
            (None, Some(sp)) => match geo {
                Some(Value::String(g)) => *g == format!("{}{}", sp, interpolate(sdmx)),
                _ => false,
            },
            (None, None) => strict_equals(geo, sdmx),
        }
    }

    fn finish(self, records: Vec<Feature>) -> JoinResult {
        JoinResult {
            unmatched: records.iter().filter(|r| r.geometry.is_none()).count(),
            matched: self.matched,
            records,
        }
    }
}

/// Text a value takes inside an interpolated string.
///
/// Missing is `undefined`, integers have no decimals, arrays are joined with
/// commas and objects collapse to `[object Object]`.
pub fn interpolate(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => interpolate(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Equality without type coercion. Containers are never equal.
fn strict_equals(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x == y,
        (Some(Value::String(x)), Some(Value::String(y))) => x == y,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => false,
    }
}

/// Distinct values of `field`, as text, in first-seen order.
pub fn distinct_values(records: &[Feature], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| interpolate(r.property(field)))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Feature-service filter selecting the boundaries referenced by `records`.
///
/// `geo_field IN ('v1','v2')`, with single quotes inside values doubled.
pub fn where_clause(records: &[Feature], geo_field: &str, sdmx_field: &str) -> String {
    let values: Vec<String> = distinct_values(records, sdmx_field)
        .into_iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect();
    format!("{} IN ({})", geo_field, values.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn record(field: &str, value: Value) -> Feature {
        let mut properties = IndexMap::new();
        properties.insert(field.to_string(), value);
        Feature::new(properties)
    }

    fn boundary(field: &str, value: Value, name: &str) -> Feature {
        let mut feature = record(field, value);
        feature.geometry = Some(Arc::new(json!({ "type": "Point", "name": name })));
        feature
    }

    fn geometry_name(feature: &Feature) -> Option<&str> {
        feature.geometry.as_deref().and_then(|g| g["name"].as_str())
    }

    fn source() -> FeatureCollection {
        FeatureCollection::new(vec![
            boundary("ISO", json!("AF"), "afghanistan"),
            boundary("ISO", json!("IR"), "iran"),
            boundary("ISO", json!(4), "numeric"),
        ])
    }

    #[test]
    fn test_no_prefix_strict_equality() {
        let records = vec![
            record("REF_AREA_CODE", json!("IR")),
            record("REF_AREA_CODE", json!("4")),
            record("REF_AREA_CODE", json!(4)),
        ];
        let spec = JoinSpec::new("ISO", None, "REF_AREA_CODE", None);

        let result = join(&source(), records, &spec);

        assert_eq!(geometry_name(&result.records[0]), Some("iran"));
        assert_eq!(geometry_name(&result.records[1]), None);
        assert_eq!(geometry_name(&result.records[2]), Some("numeric"));
        assert_eq!(result.matched, 2);
        assert_eq!(result.unmatched, 1);
    }

    #[test]
    fn test_geo_prefix_only() {
        let geometry = FeatureCollection::new(vec![boundary("code", json!("042"), "a")]);
        let spec = JoinSpec::new("code", Some("UN".into()), "area", None);

        let result = join(
            &geometry,
            vec![record("area", json!("UN042")), record("area", json!("042"))],
            &spec,
        );

        assert_eq!(geometry_name(&result.records[0]), Some("a"));
        assert!(result.records[1].geometry.is_none());
    }

    #[test]
    fn test_sdmx_prefix_only() {
        let geometry = FeatureCollection::new(vec![
            boundary("code", json!("M49_4"), "text"),
            boundary("code", json!(4), "number"),
        ]);
        let spec = JoinSpec::new("code", None, "area", Some("M49_".into()));

        let result = join(&geometry, vec![record("area", json!(4))], &spec);

        assert_eq!(geometry_name(&result.records[0]), Some("text"));
    }

    #[test]
    fn test_both_prefixes() {
        let geometry = FeatureCollection::new(vec![boundary("code", json!(4), "a")]);
        let spec = JoinSpec::new("code", Some("X-".into()), "area", Some("X-".into()));

        let result = join(&geometry, vec![record("area", json!("4"))], &spec);

        assert_eq!(geometry_name(&result.records[0]), Some("a"));
    }

    #[test]
    fn test_empty_prefix_is_unset() {
        let spec = JoinSpec::new("ISO", Some(String::new()), "area", Some(String::new()));
        assert!(spec.geo_prefix.is_none());
        assert!(spec.sdmx_prefix.is_none());
    }

    #[test]
    fn test_first_feature_wins() {
        let first = boundary("ISO", json!("AF"), "first");
        let second = boundary("ISO", json!("AF"), "second");
        let spec = JoinSpec::new("ISO", None, "area", None);

        let forward = FeatureCollection::new(vec![first.clone(), second.clone()]);
        let result = join(&forward, vec![record("area", json!("AF"))], &spec);
        assert_eq!(geometry_name(&result.records[0]), Some("first"));

        let swapped = FeatureCollection::new(vec![second, first]);
        let result = join(&swapped, vec![record("area", json!("AF"))], &spec);
        assert_eq!(geometry_name(&result.records[0]), Some("second"));
    }

    #[test]
    fn test_first_match_without_geometry_attaches_nothing() {
        let geometry = FeatureCollection::new(vec![
            record("ISO", json!("AF")),
            boundary("ISO", json!("AF"), "later"),
        ]);
        let spec = JoinSpec::new("ISO", None, "area", None);

        let result = join(&geometry, vec![record("area", json!("AF"))], &spec);

        assert!(result.records[0].geometry.is_none());
        assert_eq!(result.unmatched, 1);
    }

    #[test]
    fn test_repeated_keys_share_geometry() {
        let geometry = source();
        let spec = JoinSpec::new("ISO", None, "area", None);
        let records = vec![record("area", json!("AF")), record("area", json!("AF"))];

        let result = join(&geometry, records, &spec);

        let a = result.records[0].geometry.as_ref().unwrap();
        let b = result.records[1].geometry.as_ref().unwrap();
        let origin = geometry.features[0].geometry.as_ref().unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert!(Arc::ptr_eq(a, origin));
    }

    #[test]
    fn test_idempotent() {
        let geometry = source();
        let spec = JoinSpec::new("ISO", None, "area", None);
        let records = vec![record("area", json!("IR")), record("area", json!("ZZ"))];

        let once = join(&geometry, records, &spec);
        let twice = join(&geometry, once.records.clone(), &spec);

        assert_eq!(once.matched, twice.matched);
        for (a, b) in once.records.iter().zip(&twice.records) {
            match (&a.geometry, &b.geometry) {
                (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
                (None, None) => {}
                _ => panic!("join is not idempotent"),
            }
        }
    }

    #[test]
    fn test_existing_geometry_not_counted_unmatched() {
        let spec = JoinSpec::new("ISO", None, "area", None);
        let earlier = boundary("area", json!("ZZ"), "earlier");

        let result = join(&source(), vec![earlier, record("area", json!("ZZ"))], &spec);

        assert_eq!(geometry_name(&result.records[0]), Some("earlier"));
        assert_eq!(result.matched, 0);
        assert_eq!(result.unmatched, 1);
    }

    #[test]
    fn test_missing_field_on_both_sides_matches() {
        let geometry = FeatureCollection::new(vec![boundary("other", json!(1), "a")]);
        let spec = JoinSpec::new("ISO", None, "area", None);

        let result = join(&geometry, vec![record("elsewhere", json!(1))], &spec);

        assert_eq!(geometry_name(&result.records[0]), Some("a"));
    }

    #[test]
    fn test_cancellation() {
        let spec = JoinSpec::new("ISO", None, "area", None);
        let records = vec![record("area", json!("AF"))];

        let cancel = AtomicBool::new(true);
        let err = join_cancellable(&source(), records.clone(), &spec, &cancel).unwrap_err();
        assert!(matches!(err, JoinError::Cancelled { processed: 0 }));

        let go = AtomicBool::new(false);
        let result = join_cancellable(&source(), records, &spec, &go).unwrap();
        assert_eq!(result.matched, 1);
    }

    #[test]
    fn test_interpolate() {
        assert_eq!(interpolate(None), "undefined");
        assert_eq!(interpolate(Some(&Value::Null)), "null");
        assert_eq!(interpolate(Some(&json!(4))), "4");
        assert_eq!(interpolate(Some(&json!(4.0))), "4");
        assert_eq!(interpolate(Some(&json!(42.5))), "42.5");
        assert_eq!(interpolate(Some(&json!([1, null, "a"]))), "1,,a");
        assert_eq!(interpolate(Some(&json!({ "a": 1 }))), "[object Object]");
    }

    #[test]
    fn test_where_clause() {
        let records = vec![
            record("area", json!("AF")),
            record("area", json!("IR")),
            record("area", json!("AF")),
            record("area", json!("CÔTE D'IVOIRE")),
        ];

        assert_eq!(
            where_clause(&records, "ISO", "area"),
            "ISO IN ('AF','IR','CÔTE D''IVOIRE')"
        );
        assert_eq!(distinct_values(&records, "area").len(), 3);
    }
}
