//! Subdomain to tenant resolution.
//!
//! Pure string handling, no I/O. The output is a *candidate* tenant; only
//! the gate decides whether it is actually routable.

/// Tenant substituted whenever nothing better can be derived.
pub const DEFAULT_TENANT: &str = "default";

/// Extracts a candidate tenant from a `Host` header value.
///
/// Production hosts use their first label (`cliente1.example.com` ->
/// `cliente1`). Local development hosts (`localhost`, `*.localhost`,
/// `127.0.0.1`) prefer the `dev_override` query value, then a
/// `sub.localhost` prefix, then [`DEFAULT_TENANT`].
///
/// Always returns a non-empty string.
pub fn resolve(host: &str, dev_override: Option<&str>) -> String {
    let host = host.split(':').next().unwrap_or("");

    if is_local(host) {
        if let Some(tenant) = dev_override.filter(|t| !t.is_empty()) {
            return tenant.to_string();
        }

        return match first_label(host.trim_end_matches(".localhost")) {
            Some(sub) if sub != "localhost" && sub != "127" => sub.to_string(),
            _ => DEFAULT_TENANT.to_string(),
        };
    }

    match first_label(host) {
        Some(sub) => sub.to_string(),
        None => DEFAULT_TENANT.to_string(),
    }
}

fn is_local(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost") || host == "127.0.0.1"
}

fn first_label(host: &str) -> Option<&str> {
    host.split('.').next().filter(|label| !label.is_empty())
}
