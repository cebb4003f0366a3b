#![no_main]

use dbping::client::{connection_string, ConnectionInfo};
use dbping::config::PgConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing arbitrary input must never panic.
    let Ok(info) = ConnectionInfo::parse(s) else {
        return;
    };

    // Anything that parsed rebuilds into a string that parses to the same fields,
    // as long as the fields themselves don't contain URI delimiters.
    let delimiters = ['@', ':', '/', '?'];
    if info.user.contains(delimiters)
        || info.host.contains(delimiters)
        || info.database.contains(delimiters)
    {
        return;
    }
    let config = PgConfig {
        user: info.user.clone(),
        database: info.database.clone(),
        host: info.host.clone(),
        password: info.password.clone(),
        port: info.port.to_string(),
        sslmode: info.sslmode,
        sslrootcert: None,
    };
    let reparsed = ConnectionInfo::parse(&connection_string(&config)).expect("rebuilt string parses");
    assert_eq!(reparsed.user, info.user);
    assert_eq!(reparsed.host, info.host);
    assert_eq!(reparsed.port, info.port);
    assert_eq!(reparsed.database, info.database);
});
