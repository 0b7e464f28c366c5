//! Human-readable route references

use anyhow::{bail, Result};
use rand::Rng;
use sqlx::PgConnection;
use tracing::debug;

use crate::db::queries;
use crate::defaults::{MAX_REFERENCE_ATTEMPTS, REFERENCE_DIGITS, REFERENCE_PREFIX};

/// `SV` followed by random digits, e.g. `SV04718233`
pub fn generate_reference<R: Rng + ?Sized>(rng: &mut R) -> String {
    let digits: String = (0..REFERENCE_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{}{}", REFERENCE_PREFIX, digits)
}

/// Draw references until one is not taken.
pub async fn unique_reference(conn: &mut PgConnection) -> Result<String> {
    for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
        let candidate = generate_reference(&mut rand::thread_rng());
        if !queries::route::reference_exists(&mut *conn, &candidate).await? {
            return Ok(candidate);
        }
        debug!("Route reference {} taken (attempt {})", candidate, attempt);
    }
    bail!("No free route reference after {} attempts", MAX_REFERENCE_ATTEMPTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reference_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let reference = generate_reference(&mut rng);
            assert_eq!(reference.len(), 10);
            assert!(reference.starts_with("SV"));
            assert!(reference[2..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_same_seed_same_reference() {
        let a = generate_reference(&mut StdRng::seed_from_u64(42));
        let b = generate_reference(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
