use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

pub type EntityId = i64;

/// Hands out ids for entities created while the remote service is unreachable.
///
/// Ids are millisecond timestamps, bumped past the previous id when two
/// creations land in the same millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> EntityId {
        let candidate = now.timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(seen) => last = seen,
            }
        }
    }
}

/// Parse a timestamp the way the backend and older caches write them: RFC 3339
/// with an offset, or a naive datetime which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Serde adapter: RFC 3339 out, [`parse_timestamp`] in.
pub(crate) mod timestamp {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

pub(crate) mod timestamp_opt {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_str(&dt.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

/// Serde adapter for ids written by older clients, which minted quick-add ids
/// as `Date.now() + Math.random()`. Fractions are truncated, so the
/// millisecond part survives; numeric strings are accepted as well.
pub(crate) mod lenient_id {
    use super::*;
    use serde::de::{self, Visitor};

    /// Largest float that still maps onto an exact integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_991.0;

    struct IdVisitor;

    impl Visitor<'_> for IdVisitor {
        type Value = EntityId;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a numeric id")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
            EntityId::try_from(v).map_err(|_| E::custom(format!("id out of range: {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntityId, E> {
            if v.is_finite() && v.abs() <= MAX_EXACT {
                Ok(v.trunc() as EntityId)
            } else {
                Err(E::custom(format!("id out of range: {}", v)))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
            let v = v.trim();
            match v.parse::<EntityId>() {
                Ok(id) => Ok(id),
                Err(_) => match v.parse::<f64>() {
                    Ok(f) => self.visit_f64(f),
                    Err(_) => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                },
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EntityId, D::Error> {
        d.deserialize_any(IdVisitor)
    }
}

/// A bare id decoded with [`lenient_id`], for id lists in the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LenientId(pub EntityId);

impl<'de> Deserialize<'de> for LenientId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        lenient_id::deserialize(d).map(LenientId)
    }
}
