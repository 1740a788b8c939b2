use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Generates an invitation code: 8 characters, uppercase letters and digits.
/// Uniqueness is not guaranteed here, the caller retries on collision.
pub fn invitation_code() -> String {
    random_string(8)
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
