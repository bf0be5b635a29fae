use super::event::EventType;

/// Display string for an event-type tag. Pure lookup, no behavior.
pub fn display_name(event_type: EventType) -> &'static str {
    match event_type {
        EventType::MainMatch => "Main Match",
        EventType::Corners => "Corners",
        EventType::YellowCards => "Yellow Cards",
        EventType::Fouls => "Fouls",
        EventType::ShotsOnTarget => "Shots on Target",
        EventType::Offsides => "Offsides",
        EventType::ThrowIns => "Throw-ins",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_type_has_a_display_name() {
        for ty in [
            EventType::MainMatch,
            EventType::Corners,
            EventType::YellowCards,
            EventType::Fouls,
            EventType::ShotsOnTarget,
            EventType::Offsides,
            EventType::ThrowIns,
        ] {
            assert!(!display_name(ty).is_empty());
        }
    }
}
