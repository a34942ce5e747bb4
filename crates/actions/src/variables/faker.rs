//! `{{faker.<method>}}` generators.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Carmen", "Dmitri", "Elena", "Farid", "Grace", "Hiro", "Ines", "Jonas",
    "Kara", "Luca", "Maya", "Nils", "Olga", "Pedro", "Quinn", "Rosa", "Sami", "Tara",
];

const LAST_NAMES: &[&str] = &[
    "Anders", "Baker", "Costa", "Dubois", "Evans", "Fischer", "Garcia", "Hansen", "Ito",
    "Jensen", "Kowalski", "Lopez", "Moreau", "Novak", "Okafor", "Petrov", "Quintero", "Rossi",
    "Silva", "Tanaka",
];

const STREETS: &[&str] = &[
    "Maple Street", "Harbor Road", "Station Avenue", "Mill Lane", "Park Drive", "Church Way",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Lakeside", "Fairview", "Greenville", "Oakridge",
];

const COMPANY_WORDS: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Vandelay", "Stark", "Wayne", "Tyrell",
];

const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "Group", "Labs", "Systems", "Partners"];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test"];

/// Methods understood by [`generate`].
pub const METHODS: &[&str] = &[
    "name",
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "company",
    "username",
    "password",
    "uuid",
    "number",
    "integer",
    "date",
];

fn pick<R: Rng + ?Sized>(rng: &mut R, words: &[&'static str]) -> &'static str {
    words.choose(rng).copied().unwrap_or_default()
}

fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

/// Generate a fake value for `method`, or `None` when the method is unknown.
pub fn generate(method: &str) -> Option<String> {
    let rng = &mut rand::thread_rng();
    let value = match method {
        "name" => format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
        "first_name" => pick(rng, FIRST_NAMES).to_owned(),
        "last_name" => pick(rng, LAST_NAMES).to_owned(),
        "email" => format!(
            "{}.{}{}@{}",
            pick(rng, FIRST_NAMES).to_lowercase(),
            pick(rng, LAST_NAMES).to_lowercase(),
            rng.gen_range(1..1000),
            pick(rng, DOMAINS)
        ),
        "phone" => format!(
            "+1-{:03}-{:03}-{:04}",
            rng.gen_range(200..1000),
            rng.gen_range(200..1000),
            rng.gen_range(0..10_000)
        ),
        "address" => format!(
            "{} {}, {}",
            rng.gen_range(1..2000),
            pick(rng, STREETS),
            pick(rng, CITIES)
        ),
        "company" => format!(
            "{} {}",
            pick(rng, COMPANY_WORDS),
            pick(rng, COMPANY_SUFFIXES)
        ),
        "username" => format!(
            "{}_{}",
            pick(rng, FIRST_NAMES).to_lowercase(),
            rng.gen_range(100..10_000)
        ),
        "password" => alphanumeric(rng, 16),
        "uuid" => uuid::Uuid::new_v4().to_string(),
        "number" | "integer" => rng.gen_range(1..=1000).to_string(),
        "date" => {
            let days_back = rng.gen_range(0..3650);
            (chrono::Utc::now().date_naive() - chrono::Duration::days(days_back))
                .format("%Y-%m-%d")
                .to_string()
        }
        _ => return None,
    };
    Some(value)
}
