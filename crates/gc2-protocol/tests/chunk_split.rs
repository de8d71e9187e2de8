//! Property: the parsed message sequence is independent of USB chunk
//! boundaries. For any split of a byte stream into chunks, the assembler
//! emits the same events as a single feed of the whole stream.

use gc2_protocol::{AssemblerEvent, MessageAssembler};
use proptest::prelude::*;

const MESSAGES: &[&str] = &[
    "0H\nSHOT_ID=1\nSPEED_MPH=167.0\nELEVATION_DEG=10.9\nAZIMUTH_DEG=0.0\n\
     SPIN_RPM=2686\nBACK_RPM=2686\nSIDE_RPM=0\nMSEC_SINCE_CONTACT=1000\n\t",
    "0M\nFLAGS=7\nBALLS=1\n\t",
    "0H\nSHOT_ID=2\nSPEED_MPH=120.0\nELEVATION_DEG=16.3\nBACK_RPM=7097\n\
     SIDE_RPM=-400\nMSEC_SINCE_CONTACT=1100\n\t",
    "0M\nFLAGS=1\nBALLS=0\nBALL1=10,20,30\n\t",
];

fn reference_events(stream: &[u8]) -> Vec<AssemblerEvent> {
    let mut assembler = MessageAssembler::default();
    assembler.feed(stream).expect("reference feed")
}

fn chunked_events(stream: &[u8], cuts: &[usize]) -> Vec<AssemblerEvent> {
    let mut assembler = MessageAssembler::default();
    let mut events = Vec::new();
    let mut start = 0;
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c % (stream.len() + 1)).collect();
    cuts.sort_unstable();
    for cut in cuts {
        if cut > start {
            events.extend(assembler.feed(&stream[start..cut]).expect("chunk feed"));
            start = cut;
        }
    }
    events.extend(assembler.feed(&stream[start..]).expect("tail feed"));
    events
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn chunking_does_not_change_events(
        order in proptest::collection::vec(0usize..MESSAGES.len(), 1..6),
        cuts in proptest::collection::vec(0usize..4096, 0..24),
    ) {
        let stream: Vec<u8> = order
            .iter()
            .flat_map(|&i| MESSAGES[i].bytes())
            .collect();

        let reference = reference_events(&stream);
        let chunked = chunked_events(&stream, &cuts);

        prop_assert_eq!(reference, chunked);
    }

    #[test]
    fn byte_at_a_time_matches_single_feed(
        order in proptest::collection::vec(0usize..MESSAGES.len(), 1..4),
    ) {
        let stream: Vec<u8> = order
            .iter()
            .flat_map(|&i| MESSAGES[i].bytes())
            .collect();

        let reference = reference_events(&stream);

        let mut assembler = MessageAssembler::default();
        let mut events = Vec::new();
        for &byte in &stream {
            events.extend(assembler.feed(&[byte]).expect("byte feed"));
        }

        prop_assert_eq!(reference, events);
    }
}
