//! In-process cache of materialized store fields, keyed by exact time.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use parking_lot::Mutex;

use crate::data::field::Field;
use crate::mesh_error::MeshFieldError;
use crate::store::config::CachePolicy;
use crate::units::Quantity;

/// Exact-match key of a time instant: the bit pattern of its value in
/// seconds, with `-0.0` folded onto `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey(u64);

impl TimeKey {
    pub fn of(time: &Quantity) -> Result<Self, MeshFieldError> {
        if !time.unit.is_time() {
            return Err(MeshFieldError::IncompatibleUnits {
                from: time.unit.name().to_string(),
                to: "s".into(),
            });
        }
        let seconds = time.si_value();
        if !seconds.is_finite() {
            return Err(MeshFieldError::Unit(format!("time {time} is not finite")));
        }
        let seconds = if seconds == 0.0 { 0.0 } else { seconds };
        Ok(TimeKey(seconds.to_bits()))
    }

    pub fn seconds(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// Concurrent `TimeKey -> Arc<Field>` map. Under a bounded policy the
/// insertion order is tracked so the oldest entry is evicted first.
#[derive(Debug)]
pub(crate) struct FieldCache {
    policy: CachePolicy,
    entries: DashMap<TimeKey, Arc<Field>>,
    order: Mutex<VecDeque<TimeKey>>,
}

impl FieldCache {
    pub(crate) fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn get(&self, key: TimeKey) -> Option<Arc<Field>> {
        let hit = self.entries.get(&key).map(|f| Arc::clone(f.value()));
        debug!(
            "field cache {} for t = {} s",
            if hit.is_some() { "hit" } else { "miss" },
            key.seconds()
        );
        hit
    }

    /// Insert unless another caller got there first; returns the cached field.
    pub(crate) fn insert(&self, key: TimeKey, field: Arc<Field>) -> Arc<Field> {
        let mut order = self.order.lock();
        if let Some(existing) = self.entries.get(&key) {
            return Arc::clone(existing.value());
        }
        self.entries.insert(key, Arc::clone(&field));
        order.push_back(key);
        if let CachePolicy::Bounded { max_entries } = self.policy {
            while order.len() > max_entries {
                if let Some(old) = order.pop_front() {
                    debug!("evicting cached field at t = {} s", old.seconds());
                    self.entries.remove(&old);
                }
            }
        }
        field
    }

    pub(crate) fn contains(&self, key: TimeKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        let mut order = self.order.lock();
        order.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field_id::FieldId;
    use crate::data::value_type::{FieldType, ValueType};
    use crate::mesh::{Cell, Mesh, Vertex};
    use crate::geometry::CellGeometry;
    use crate::units::Unit;

    fn field(t: f64) -> Arc<Field> {
        let vertices = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
            .iter()
            .enumerate()
            .map(|(i, c)| Vertex::new(i, i as i64, c).unwrap())
            .collect();
        let cells = vec![Cell::new(0, 0, CellGeometry::TriangleLinear, vec![0, 1, 2]).unwrap()];
        let mesh = Arc::new(Mesh::unstructured(vertices, cells, None).unwrap());
        Arc::new(
            Field::new(
                mesh,
                FieldId::Temperature,
                ValueType::Scalar,
                Unit::dimensionless(),
                Quantity::new(t, Unit::second()),
                None,
                FieldType::VertexBased,
            )
            .unwrap(),
        )
    }

    fn key(t: f64) -> TimeKey {
        TimeKey::of(&Quantity::new(t, Unit::second())).unwrap()
    }

    #[test]
    fn time_key_is_unit_aware_and_exact() {
        let minute = Quantity::parse(1.0, "min").unwrap();
        assert_eq!(TimeKey::of(&minute).unwrap(), key(60.0));
        assert_ne!(key(1.0), key(1.0 + 1e-12));
        assert_eq!(key(-0.0), key(0.0));
        assert!(TimeKey::of(&Quantity::parse(1.0, "m").unwrap()).is_err());
    }

    #[test]
    fn bounded_policy_evicts_oldest() {
        let cache = FieldCache::new(CachePolicy::Bounded { max_entries: 2 });
        for t in [1.0, 2.0, 3.0] {
            cache.insert(key(t), field(t));
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(key(1.0)));
        assert!(cache.contains(key(3.0)));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn first_insert_wins() {
        let cache = FieldCache::new(CachePolicy::Unbounded);
        let a = field(1.0);
        let kept = cache.insert(key(1.0), Arc::clone(&a));
        let again = cache.insert(key(1.0), field(1.0));
        assert!(Arc::ptr_eq(&kept, &again));
        assert!(Arc::ptr_eq(&a, &cache.get(key(1.0)).unwrap()));
    }
}
