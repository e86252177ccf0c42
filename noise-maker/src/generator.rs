use chrono::Local;
use rand::{Rng, seq::IndexedRandom};

const METHODS: [(&str, u8); 4] = [("GET", 6), ("POST", 2), ("PUT", 1), ("DELETE", 1)];
const PATHS: [(&str, u8); 6] = [
    ("/", 10),
    ("/login", 10),
    ("/api", 50),
    ("/admin", 5),
    ("/splash", 20),
    ("/gallery", 10),
];
const STATUS: [(u16, u8); 6] = [
    (200, 50),
    (201, 10),
    (400, 10),
    (401, 20),
    (404, 50),
    (500, 5),
];
const REFERERS: [(&str, u8); 3] = [
    ("-", 20),
    ("https://www.example.com/", 5),
    ("https://search.example.org/?q=logs", 2),
];
const AGENTS: [(&str, u8); 4] = [
    ("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0", 20),
    ("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15", 10),
    ("curl/8.7.1", 5),
    ("-", 2),
];
const BROKEN: [(&str, u8); 4] = [
    ("truncated", 5),
    ("bad_timestamp", 3),
    ("bad_status", 3),
    ("unterminated_quote", 2),
];

fn ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "192.168.{}.{}",
        rng.random_range(0..256),
        rng.random_range(0..256)
    )
}

pub fn generate_combined_log<R: Rng + ?Sized>(rng: &mut R) -> String {
    let ip = ip(rng);
    let timestamp = Local::now().format("%d/%b/%Y:%H:%M:%S %z");
    let method = METHODS.choose_weighted(rng, |(_, w)| *w).unwrap().0;
    let path = PATHS.choose_weighted(rng, |(_, w)| *w).unwrap().0;
    let status = STATUS.choose_weighted(rng, |(_, w)| *w).unwrap().0;
    let size = rng.random_range(100..2000);
    let referer = REFERERS.choose_weighted(rng, |(_, w)| *w).unwrap().0;
    let agent = AGENTS.choose_weighted(rng, |(_, w)| *w).unwrap().0;

    format!(
        "{ip} - - [{timestamp}] \"{method} {path} HTTP/1.1\" {status} {size} \"{referer}\" \"{agent}\""
    )
}

/// A line that looks like an access log entry but must fail to parse.
pub fn generate_malformed_log<R: Rng + ?Sized>(rng: &mut R) -> String {
    let ip = ip(rng);
    let timestamp = Local::now().format("%d/%b/%Y:%H:%M:%S %z");
    match BROKEN.choose_weighted(rng, |(_, w)| *w).unwrap().0 {
        "truncated" => format!("{ip} - - [{timestamp}]"),
        "bad_timestamp" => format!("{ip} - - [{}] \"GET / HTTP/1.1\" 200 10", Local::now().to_rfc3339()),
        "bad_status" => format!("{ip} - - [{timestamp}] \"GET / HTTP/1.1\" OK 10"),
        _ => format!("{ip} - - [{timestamp}] \"GET / HTTP/1.1 200 10"),
    }
}
