//! Input Router: translates wire control codes into entity actions.
//!
//! Codes ride an unreliable channel, so decoding must stay tolerant:
//! a release arriving before its press just leaves the flag false, and a
//! duplicate press re-asserts a flag that is already set.

/// A held control flag on a player entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlag {
    RotateLeft,
    RotateRight,
    Thrust,
}

/// Decoded input action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Press(ControlFlag),
    Release(ControlFlag),
    /// One-shot action, does not toggle a persistent flag
    Shoot,
}

/// Decode a single control code: lower-case = key down, upper-case = key up,
/// 's' = shoot. Anything else decodes to None and is ignored by the caller.
pub fn decode(code: char) -> Option<InputAction> {
    match code {
        'l' => Some(InputAction::Press(ControlFlag::RotateLeft)),
        'L' => Some(InputAction::Release(ControlFlag::RotateLeft)),
        'r' => Some(InputAction::Press(ControlFlag::RotateRight)),
        'R' => Some(InputAction::Release(ControlFlag::RotateRight)),
        't' => Some(InputAction::Press(ControlFlag::Thrust)),
        'T' => Some(InputAction::Release(ControlFlag::Thrust)),
        's' => Some(InputAction::Shoot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_press_and_release_pairs() {
        assert_eq!(decode('l'), Some(InputAction::Press(ControlFlag::RotateLeft)));
        assert_eq!(decode('L'), Some(InputAction::Release(ControlFlag::RotateLeft)));
        assert_eq!(decode('r'), Some(InputAction::Press(ControlFlag::RotateRight)));
        assert_eq!(decode('R'), Some(InputAction::Release(ControlFlag::RotateRight)));
        assert_eq!(decode('t'), Some(InputAction::Press(ControlFlag::Thrust)));
        assert_eq!(decode('T'), Some(InputAction::Release(ControlFlag::Thrust)));
    }

    #[test]
    fn shoot_is_a_one_shot_action() {
        assert_eq!(decode('s'), Some(InputAction::Shoot));
        // there is no "shoot release"
        assert_eq!(decode('S'), None);
    }

    #[test]
    fn unknown_codes_are_ignored() {
        for code in ['x', 'Z', '1', ' ', '\n', 'é'] {
            assert_eq!(decode(code), None);
        }
    }
}
