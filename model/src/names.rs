use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "attractive", "beautiful", "confident", "delightful", "exciting", "fabulous", "gorgeous",
    "hilarious", "ridiculous", "scrumptious", "unique", "wonderful", "adorable", "amazing",
    "floral", "grumpy", "nervous", "ferocious", "noisy", "wiggly",
];

const NOUNS: &[&str] = &[
    "creature", "wardrobe", "sculpture", "painting", "mushroom", "rainbow", "unicorn", "monster",
    "party", "sheepdog", "outfit", "gopher", "badger", "otter", "wolverine", "hippo", "sparrow",
    "mongoose", "penguin", "walrus",
];

/// Generates a readable, unique-enough name such as `floral-badger-1667320118`.
pub fn generate_cluster_name() -> String {
    let random = Uuid::new_v4();
    let bytes = random.as_bytes();
    let adjective = ADJECTIVES[usize::from(bytes[0]) % ADJECTIVES.len()];
    let noun = NOUNS[usize::from(bytes[1]) % NOUNS.len()];
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("{}-{}-{}", adjective, noun, timestamp)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_names() {
        let name = generate_cluster_name();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(NOUNS.contains(&parts[1]));
        assert!(parts[2].parse::<u64>().is_ok());
    }
}
