use crate::session::Phase;

const STANDBY: &[&str] = &[
    r"   o      o      o   ",
    r"  /|\    /|\    /|\  ",
    r"  / \    / \    / \  ",
    r"                     ",
    r"     waiting . . .   ",
];

const WORK: &[&str] = &[
    r"      o   ________   ",
    r"     /|\ |  ____  |  ",
    r"     / \ | |____| |  ",
    r"    _____|________|_ ",
    r"     heads down      ",
];

const HAPPY: &[&str] = &[
    r"  \o/    \o/    \o/  ",
    r"   |      |      |   ",
    r"  / \    / \    / \  ",
    r"                     ",
    r"     take a break!   ",
];

/// Static picture shown for each phase.
pub fn for_phase(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Idle => STANDBY,
        Phase::Working => WORK,
        Phase::Resting => HAPPY,
    }
}
