#![no_main]

use libfuzzer_sys::fuzz_target;
use toolconf::change::apply_changes;
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
    ]
    .into_iter()
    .map(OptionState::new)
    .collect();
    let file = ConfFile::parse("# seed\nverbose\ngroup a\n", &mut options, "fuzz.conf");

    let _ = apply_changes(&mut options, ',', text.lines());

    // Whatever was accepted must render and parse back to the same values.
    let rendered = file.render(&options);
    let mut reparsed = options.clone();
    ConfFile::parse(&rendered, &mut reparsed, "fuzz.conf");
    for (before, after) in options.iter().zip(&reparsed) {
        assert_eq!(before.current.values(), after.current.values());
    }
});
