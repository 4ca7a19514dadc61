//! # Cluster-result cache
//! In-process TTL cache for computed clusters, keyed by the deterministic
//! signature of `(params, input content)`. A miss or an expired entry is an
//! ordinary outcome; callers fall back to local computation and repopulate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::counter;

use crate::cluster::Cluster;

struct Entry {
    clusters: Vec<Cluster>,
    inserted: Instant,
}

pub struct ClusterCache {
    inner: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl ClusterCache {
    pub fn with_ttl_ms(ttl_ms: u64) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    /// `Some(clusters)` on a live hit, `None` on miss or expiry. Expired
    /// entries are evicted on the way out.
    pub fn get(&self, signature: &str) -> Option<Vec<Cluster>> {
        let mut map = self.inner.lock().expect("cluster cache mutex poisoned");
        match map.get(signature) {
            Some(e) if e.inserted.elapsed() <= self.ttl => {
                counter!("cluster_cache_hits_total").increment(1);
                Some(e.clusters.clone())
            }
            Some(_) => {
                map.remove(signature);
                counter!("cluster_cache_misses_total").increment(1);
                None
            }
            None => {
                counter!("cluster_cache_misses_total").increment(1);
                None
            }
        }
    }

    pub fn put(&self, signature: String, clusters: Vec<Cluster>) {
        let mut map = self.inner.lock().expect("cluster cache mutex poisoned");
        map.insert(
            signature,
            Entry {
                clusters,
                inserted: Instant::now(),
            },
        );
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{compute_clusters, ClusterParams};
    use crate::ingest::types::{Coordinates, QuakeEvent};

    fn sample_clusters() -> Vec<Cluster> {
        let events: Vec<QuakeEvent> = (0..3)
            .map(|i| QuakeEvent {
                id: format!("e{i}"),
                time: Some(i * 3_600_000),
                magnitude: Some(2.0 + i as f64),
                place: None,
                alert: None,
                tsunami: false,
                depth_km: None,
                coords: Some(Coordinates {
                    lon: 0.01 * i as f64,
                    lat: 0.01 * i as f64,
                    depth_km: None,
                }),
            })
            .collect();
        compute_clusters(&events, &ClusterParams::default())
    }

    #[test]
    fn miss_then_hit_then_expiry() {
        let cache = ClusterCache::with_ttl_ms(40);
        let key = "sig".to_string();
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), sample_clusters());
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(200)); // 5x TTL, no boundary flakes
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn distinct_signatures_do_not_collide() {
        let cache = ClusterCache::with_ttl_ms(10_000);
        cache.put("a".to_string(), sample_clusters());
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }
}
