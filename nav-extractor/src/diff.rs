//! Structural diff engine.
//!
//! Records describe themselves through the `Record` trait: an ordered field
//! table where every entry is a leaf value, a nested record, an optional nested
//! record, or a volatile field that is ignored by comparison. `diff` walks two
//! tables side by side and keeps only what changed; `apply` replays a patch.

use crate::error::PatchError;
use crate::value::{mismatch, DiffPatch, FromValue, Value};
use tracing::trace;

/// One entry of a record's field table
pub enum Field<'a> {
    Leaf(Value),
    Record(&'a dyn Record),
    OptionalRecord(Option<&'a dyn Record>),
    /// Changes on every update but carries no meaning; never compared or sent
    Volatile,
}

/// A record type that can be diffed and patched field by field.
///
/// `fields` must return the same names in the same order for every instance.
pub trait Record {
    /// Name used in patch errors
    fn record_name(&self) -> &'static str;

    fn fields(&self) -> Vec<(&'static str, Field<'_>)>;

    /// Overwrite (or recurse into) the named field
    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError>;
}

/// Minimal patch turning `previous` into `current`
pub fn diff(previous: &dyn Record, current: &dyn Record) -> DiffPatch {
    let mut patch = DiffPatch::new();

    for ((name, old), (_, new)) in previous.fields().into_iter().zip(current.fields()) {
        match (old, new) {
            (Field::Volatile, _) | (_, Field::Volatile) => {}
            (Field::Leaf(old), Field::Leaf(new)) => {
                if old != new {
                    patch.insert(name.to_string(), new);
                }
            }
            (Field::Record(old), Field::Record(new)) => {
                let nested = diff(old, new);
                if !nested.is_empty() {
                    patch.insert(name.to_string(), Value::Map(nested));
                }
            }
            (Field::OptionalRecord(old), Field::OptionalRecord(new)) => match (old, new) {
                (None, None) => {}
                (None, Some(new)) => {
                    patch.insert(name.to_string(), Value::Map(snapshot(new)));
                }
                (Some(_), None) => {
                    patch.insert(name.to_string(), Value::Null);
                }
                (Some(old), Some(new)) => {
                    let nested = diff(old, new);
                    if !nested.is_empty() {
                        patch.insert(name.to_string(), Value::Map(nested));
                    }
                }
            },
            (_, new) => {
                // Field tables disagree; fall back to sending the whole field
                trace!("Field {} changed shape, sending it whole", name);
                patch.insert(name.to_string(), field_value(new));
            }
        }
    }

    patch
}

/// Every non-volatile field of a record as a patch
pub fn snapshot(record: &dyn Record) -> DiffPatch {
    record
        .fields()
        .into_iter()
        .filter(|(_, field)| !matches!(field, Field::Volatile))
        .map(|(name, field)| (name.to_string(), field_value(field)))
        .collect()
}

fn field_value(field: Field<'_>) -> Value {
    match field {
        Field::Leaf(value) => value,
        Field::Record(record) => Value::Map(snapshot(record)),
        Field::OptionalRecord(Some(record)) => Value::Map(snapshot(record)),
        Field::OptionalRecord(None) | Field::Volatile => Value::Null,
    }
}

/// Apply a patch produced by `diff` or `snapshot`
pub fn apply(target: &mut dyn Record, patch: &DiffPatch) -> Result<(), PatchError> {
    for (name, value) in patch {
        target.apply_field(name, value)?;
    }
    Ok(())
}

/// Equality under the diff rule: volatile fields are ignored
pub fn equivalent(a: &dyn Record, b: &dyn Record) -> bool {
    diff(a, b).is_empty()
}

/// Overwrite a leaf field from a patch value
pub fn assign<T: FromValue>(slot: &mut T, value: &Value) -> Result<(), PatchError> {
    *slot = T::from_value(value)?;
    Ok(())
}

/// Recurse into a nested record field
pub fn apply_nested<R: Record>(target: &mut R, value: &Value) -> Result<(), PatchError> {
    match value {
        Value::Map(patch) => apply(target, patch),
        other => Err(mismatch("map", other)),
    }
}

/// Recurse into an optional nested record, creating or clearing it as needed
pub fn apply_optional<R: Record + Default>(
    target: &mut Option<R>,
    value: &Value,
) -> Result<(), PatchError> {
    match value {
        Value::Null => {
            *target = None;
            Ok(())
        }
        Value::Map(patch) => apply(target.get_or_insert_with(R::default), patch),
        other => Err(mismatch("map", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Inner {
        label: Option<String>,
        count: i64,
    }

    impl Record for Inner {
        fn record_name(&self) -> &'static str {
            "Inner"
        }

        fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
            vec![
                ("label", Field::Leaf(self.label.clone().into())),
                ("count", Field::Leaf(self.count.into())),
            ]
        }

        fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
            match name {
                "label" => assign(&mut self.label, value),
                "count" => assign(&mut self.count, value),
                _ => Err(PatchError::UnknownField {
                    record: self.record_name(),
                    field: name.to_string(),
                }),
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Outer {
        flag: bool,
        inner: Inner,
        extra: Option<Inner>,
        stamp: i64,
    }

    impl Record for Outer {
        fn record_name(&self) -> &'static str {
            "Outer"
        }

        fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
            vec![
                ("flag", Field::Leaf(self.flag.into())),
                ("inner", Field::Record(&self.inner)),
                (
                    "extra",
                    Field::OptionalRecord(self.extra.as_ref().map(|r| r as &dyn Record)),
                ),
                ("stamp", Field::Volatile),
            ]
        }

        fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), PatchError> {
            match name {
                "flag" => assign(&mut self.flag, value),
                "inner" => apply_nested(&mut self.inner, value),
                "extra" => apply_optional(&mut self.extra, value),
                _ => Err(PatchError::UnknownField {
                    record: self.record_name(),
                    field: name.to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_identical_is_empty() {
        let a = Outer {
            flag: true,
            ..Default::default()
        };
        assert!(diff(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_volatile_ignored() {
        let a = Outer {
            stamp: 1,
            ..Default::default()
        };
        let b = Outer {
            stamp: 2,
            ..Default::default()
        };
        assert!(equivalent(&a, &b));
    }

    #[test]
    fn test_nested_change_only() {
        let a = Outer::default();
        let mut b = a.clone();
        b.inner.count = 4;

        let patch = diff(&a, &b);
        assert_eq!(patch.len(), 1);
        let nested = patch["inner"].as_map().unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested["count"], Value::Int(4));
    }

    #[test]
    fn test_optional_appears_and_disappears() {
        let a = Outer::default();
        let b = Outer {
            extra: Some(Inner {
                label: Some("x".into()),
                count: 0,
            }),
            ..Default::default()
        };

        let appear = diff(&a, &b);
        let full = appear["extra"].as_map().unwrap();
        assert_eq!(full.len(), 2);

        let disappear = diff(&b, &a);
        assert_eq!(disappear["extra"], Value::Null);
    }

    #[test]
    fn test_apply_reproduces_target() {
        let a = Outer {
            flag: false,
            inner: Inner {
                label: Some("a".into()),
                count: 1,
            },
            extra: None,
            stamp: 10,
        };
        let b = Outer {
            flag: true,
            inner: Inner {
                label: None,
                count: 1,
            },
            extra: Some(Inner::default()),
            stamp: 20,
        };

        let mut patched = a.clone();
        apply(&mut patched, &diff(&a, &b)).unwrap();
        assert!(equivalent(&patched, &b));
        assert_eq!(patched.stamp, 10);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut target = Outer::default();
        let mut patch = DiffPatch::new();
        patch.insert("speed".into(), Value::Int(3));
        assert_eq!(
            apply(&mut target, &patch),
            Err(PatchError::UnknownField {
                record: "Outer",
                field: "speed".into()
            })
        );
    }
}
