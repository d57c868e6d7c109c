#![no_main]

use libfuzzer_sys::fuzz_target;
use toolconf::confile::ConfFile;
use toolconf::schema::{OptionSpec, OptionState, OptionType};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut options: Vec<OptionState> = [
        OptionSpec::new("verbose", OptionType::Flag),
        OptionSpec::new("keyserver", OptionType::String),
        OptionSpec::new("max-cache-ttl", OptionType::Integer),
        OptionSpec::new("group", OptionType::ListOfString),
        OptionSpec::new("alias", OptionType::Alias),
    ]
    .into_iter()
    .map(OptionState::new)
    .collect();

    // An unmodified model must render back to the exact input.
    let file = ConfFile::parse(text, &mut options, "fuzz.conf");
    assert_eq!(file.render(&options), text);
});
