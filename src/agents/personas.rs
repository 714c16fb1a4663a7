//! The two diagnostic personas
//!
//! Both call the same capability. They differ only in name and behaviour
//! instructions, which backends either follow literally (chat backend) or
//! implement as rules (rule engine).

use super::producer::{AgentPersona, PersonaRole};

pub const PRODUCTION_AGENT_NAME: &str = "Production Agent";
pub const INTEGRITY_AGENT_NAME: &str = "Integrity Agent";

/// Behaviour contract for the production persona
const PRODUCTION_INSTRUCTIONS: &str = r"You are the Senior Production Technologist.
Your Goal: Identify wells with 'High Potential' for oil gain.

Rules:
1. Analyze 'current_rate' vs 'potential_rate'.
2. If potential exceeds current by more than 20%, recommend intervention.
3. If water_cut > 90%, flag as 'High Risk' unless the potential upside is massive.
4. Ignore mechanical issues; that is not your department. Always set blocking_flag to false.
5. If no intervention is justified, the recommendation must start with 'No action'.";

/// Behaviour contract for the integrity persona
const INTEGRITY_INSTRUCTIONS: &str = r"You are the Well Integrity Specialist.
Your Goal: Ensure safety and mechanical feasibility.

CRITICAL INSTRUCTIONS:
1. Scan the 'mechanical_issues' and 'casing_status' fields.
2. If you see keywords like 'Collapse', 'Leak', 'Restriction', 'Sand' ingress or 'Corrosion':
   - You MUST set 'blocking_flag' to true.
   - Severity must be 'High'.
3. If blocking_flag is true, your recommendation must be 'DO NOT INTERVENE' or 'RIG WORKOVER REQUIRED'.";

impl AgentPersona {
    pub fn production() -> Self {
        Self {
            name: PRODUCTION_AGENT_NAME.to_string(),
            role: PersonaRole::Production,
            instructions: PRODUCTION_INSTRUCTIONS.to_string(),
        }
    }

    pub fn integrity() -> Self {
        Self {
            name: INTEGRITY_AGENT_NAME.to_string(),
            role: PersonaRole::Integrity,
            instructions: INTEGRITY_INSTRUCTIONS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personas_share_shape_but_not_instructions() {
        let production = AgentPersona::production();
        let integrity = AgentPersona::integrity();
        assert_eq!(production.role, PersonaRole::Production);
        assert_eq!(integrity.role, PersonaRole::Integrity);
        assert_ne!(production.instructions, integrity.instructions);
        assert!(integrity.instructions.contains("blocking_flag"));
        assert!(production.instructions.contains("Ignore mechanical issues"));
    }
}
