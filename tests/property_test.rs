//! Property checks for locator normalization and controller transitions

use embedguard::controller::{Action, ControllerState, Outcome, Trigger};
use embedguard::{EmbedMode, SourceBuilder, VideoIdExtractor};
use proptest::prelude::*;
use url::Url;

fn extractor() -> VideoIdExtractor {
    VideoIdExtractor::new(Url::parse("https://example.com/pricing").unwrap())
}

fn trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        Just(Trigger::Ready),
        proptest::option::of(100i32..200).prop_map(Trigger::Error),
        Just(Trigger::ShortWatchdog),
        Just(Trigger::LongWatchdog),
        Just(Trigger::RebindDue),
    ]
}

proptest! {
    /// Normalizing a locator and extracting again yields the same id,
    /// whichever host the locator was rewritten to.
    #[test]
    fn normalized_locators_keep_their_video(id in "[A-Za-z0-9_-]{6,16}", standard in any::<bool>()) {
        let extractor = extractor();
        let original = format!("https://www.youtube.com/embed/{id}?start=30");
        let first = extractor.extract(&original).expect("id in embed path");
        prop_assert_eq!(first.as_str(), id.as_str());

        let mode = if standard { EmbedMode::Standard } else { EmbedMode::PrivacyEnhanced };
        let rewritten = SourceBuilder::new("https://example.com").build(&first, mode);
        prop_assert_eq!(EmbedMode::of_locator(&rewritten), mode);
        let second = extractor.extract(&rewritten).expect("id survives rewrite");
        prop_assert_eq!(second, first);
    }

    #[test]
    fn extraction_never_panics(locator in "\\PC{0,64}") {
        let _ = extractor().extract(&locator);
    }

    /// Whatever order triggers arrive in: at most one domain switch, no
    /// action after settling, and the mode only ever moves to standard
    /// together with the switch.
    #[test]
    fn controller_settles_at_most_once(triggers in proptest::collection::vec(trigger(), 0..24)) {
        let mut state = ControllerState::new();
        state.mark_attached();

        let mut switches = 0;
        let mut settles = 0;
        for trigger in triggers {
            let was_settled = state.is_settled();
            let action = state.apply(trigger);
            if was_settled {
                prop_assert_eq!(action, Action::Ignore);
            }
            match action {
                Action::SwitchToStandard(_) => switches += 1,
                Action::Settle(outcome) => {
                    settles += 1;
                    prop_assert_eq!(state.outcome(), Some(outcome));
                }
                Action::Rebind => state.mark_attached(),
                Action::Ignore => {}
            }

            prop_assert!(switches <= 1);
            prop_assert!(settles <= 1);
            prop_assert_eq!(state.generation(), 1 + switches);
            prop_assert_eq!(state.attempted_standard(), switches == 1);
            prop_assert_eq!(state.mode() == EmbedMode::Standard, switches == 1);
        }

        if state.outcome() == Some(Outcome::Ready) {
            prop_assert!(!state.is_retrying());
        }
    }
}
