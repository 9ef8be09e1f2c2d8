#![no_main]

use arbitrary::Arbitrary;
use fzd::matcher::{fuzzy_match, CaseMatching};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    query: &'a str,
    candidate: &'a str,
    case_sensitive: bool,
}

fuzz_target!(|input: Input| {
    let case = if input.case_sensitive {
        CaseMatching::Sensitive
    } else {
        CaseMatching::Insensitive
    };
    if let Some(m) = fuzzy_match(input.query, input.candidate, case) {
        // One strictly increasing position per query char
        assert_eq!(m.positions.len(), input.query.chars().count());
        assert!(m.positions.windows(2).all(|w| w[0] < w[1]));
        let len = input.candidate.chars().count();
        assert!(m.positions.iter().all(|&p| p < len));
    }
});
