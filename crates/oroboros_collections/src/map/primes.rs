//! Prime table sizes.

/// Largest prime below the maximum array length.
pub(crate) const MAX_PRIME_ARRAY_LENGTH: usize = 0x7FFF_FFC3;

/// Primes of the form `p - 1 = k * HASH_PRIME` are skipped beyond the table.
const HASH_PRIME: usize = 101;

/// Precomputed sizes, each roughly 1.2x the previous.
const PRIMES: &[usize] = &[
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

pub(crate) fn is_prime(candidate: usize) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= candidate {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Smallest table size that is at least `min`.
pub(crate) fn get_prime(min: usize) -> usize {
    if let Some(&prime) = PRIMES.iter().find(|&&prime| prime >= min) {
        return prime;
    }
    (min | 1..usize::MAX)
        .step_by(2)
        .find(|&candidate| is_prime(candidate) && (candidate - 1) % HASH_PRIME != 0)
        .unwrap_or(min)
}

/// Largest table size that does not exceed `max`.
pub(crate) fn prime_at_most(max: usize) -> usize {
    if max >= MAX_PRIME_ARRAY_LENGTH {
        return MAX_PRIME_ARRAY_LENGTH;
    }
    (2..=max).rev().find(|&candidate| is_prime(candidate)).unwrap_or(max)
}

/// Caps a prime table size at `max` without leaving the primes.
pub(crate) fn clamp_prime(size: usize, max: usize) -> usize {
    if size <= max {
        size
    } else {
        prime_at_most(max)
    }
}

/// Table size for a map outgrowing `old_size`: about double, prime.
pub(crate) fn expand_prime(old_size: usize) -> usize {
    let doubled = old_size.saturating_mul(2);
    if doubled > MAX_PRIME_ARRAY_LENGTH && MAX_PRIME_ARRAY_LENGTH > old_size {
        return MAX_PRIME_ARRAY_LENGTH;
    }
    get_prime(doubled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_prime_and_sorted() {
        assert!(PRIMES.iter().all(|&p| is_prime(p)));
        assert!(PRIMES.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_get_prime() {
        assert_eq!(get_prime(0), 3);
        assert_eq!(get_prime(4), 7);
        assert_eq!(get_prime(100), 107);
        let beyond = get_prime(7_199_370);
        assert!(is_prime(beyond));
        assert!(beyond >= 7_199_370);
    }

    #[test]
    fn test_expand_prime_doubles() {
        assert_eq!(expand_prime(7), 17);
        assert_eq!(expand_prime(17), 37);
        assert_eq!(expand_prime(89), 197);
        assert_eq!(expand_prime(0x4000_0000), MAX_PRIME_ARRAY_LENGTH);
    }

    #[test]
    fn test_clamp_stays_prime() {
        assert_eq!(clamp_prime(37, 20), 19);
        assert_eq!(clamp_prime(17, 20), 17);
        assert_eq!(clamp_prime(7, 7), 7);
        assert_eq!(prime_at_most(2), 2);
        assert_eq!(prime_at_most(usize::MAX), MAX_PRIME_ARRAY_LENGTH);
    }

    #[test]
    fn test_max_prime() {
        assert!(is_prime(MAX_PRIME_ARRAY_LENGTH));
    }
}
