//! Central authorization policy.
//!
//! Every route answers "may this actor do this?" through one function
//! instead of scattering role checks across handlers. Decisions are pure:
//! the caller loads whatever entity is involved and passes the relevant
//! ids in the action. Default-deny, checked in order.

use uuid::Uuid;

use crate::models::enums::UserRole;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The signed-in principal, as established by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

/// Everything the policy can be asked about. Variants carry the owner and
/// assignment ids of the entity in question, not the entity itself.
#[derive(Debug, Clone)]
pub enum Action {
    FileCase,
    ViewQueue,
    ViewAllCases,
    ViewCase { patient_id: Uuid, doctor_id: Option<Uuid> },
    AcceptCase,
    AdvanceCase { doctor_id: Option<Uuid> },
    HideCase { doctor_id: Option<Uuid> },
    CancelCase { patient_id: Uuid },
    ViewPatientCases { patient_id: Uuid },
    OpenConversationWith { counterpart_role: UserRole },
    UseConversation { doctor_id: Uuid, patient_id: Uuid },
    ViewProfile { owner_id: Uuid },
    EditProfile { owner_id: Uuid },
    RunTriage { patient_id: Uuid },
    ViewAiSessions { patient_id: Uuid },
    PlaceOrder { patient_id: Uuid },
    ViewOrders { patient_id: Uuid },
    ManageCatalog,
    ManageUsers,
}

/// Why access was granted (or denied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Acting on the actor's own resource.
    Owner,
    /// The case is assigned to this doctor.
    AssignedDoctor,
    /// The case sits unassigned in the shared pool.
    OpenPool,
    /// One end of the conversation.
    Participant,
    /// The action is open to the actor's role as such.
    RolePermitted,
    /// Administrative oversight.
    AdminOverride,
    /// No matching rule.
    Denied,
}

/// Result of a policy check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Reason,
}

impl Decision {
    fn allow(reason: Reason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: Reason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Policy check
// ═══════════════════════════════════════════════════════════

pub fn authorize(actor: &Actor, action: &Action) -> Decision {
    use UserRole::*;

    match action {
        Action::FileCase => {
            if actor.role == Patient {
                return Decision::allow(Reason::RolePermitted);
            }
            Decision::deny()
        }

        Action::ViewQueue => {
            if actor.role == Doctor {
                return Decision::allow(Reason::RolePermitted);
            }
            Decision::deny()
        }

        Action::ViewAllCases => {
            if actor.role == Admin {
                return Decision::allow(Reason::AdminOverride);
            }
            Decision::deny()
        }

        Action::ViewCase {
            patient_id,
            doctor_id,
        } => {
            // Rule 1: the patient who filed it
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            // Rule 2: the doctor it is assigned to
            if actor.role == Doctor && *doctor_id == Some(actor.id) {
                return Decision::allow(Reason::AssignedDoctor);
            }
            // Rule 3: unassigned cases are visible to every doctor
            if actor.role == Doctor && doctor_id.is_none() {
                return Decision::allow(Reason::OpenPool);
            }
            // Rule 4: admins see everything
            if actor.role == Admin {
                return Decision::allow(Reason::AdminOverride);
            }
            Decision::deny()
        }

        Action::AcceptCase => {
            // Any doctor may claim from the pool; the conditional update
            // decides races, not the policy.
            if actor.role == Doctor {
                return Decision::allow(Reason::RolePermitted);
            }
            Decision::deny()
        }

        Action::AdvanceCase { doctor_id } => {
            // Only the doctor holding the case moves it forward.
            if actor.role == Doctor && *doctor_id == Some(actor.id) {
                return Decision::allow(Reason::AssignedDoctor);
            }
            Decision::deny()
        }

        Action::HideCase { doctor_id } => {
            // Rule 1: the assigned doctor clears their own queue
            if actor.role == Doctor && *doctor_id == Some(actor.id) {
                return Decision::allow(Reason::AssignedDoctor);
            }
            // Rule 2: unassigned pool entries can be dismissed by any doctor
            if actor.role == Doctor && doctor_id.is_none() {
                return Decision::allow(Reason::OpenPool);
            }
            Decision::deny()
        }

        Action::CancelCase { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            Decision::deny()
        }

        Action::ViewPatientCases { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            if actor.role == Admin {
                return Decision::allow(Reason::AdminOverride);
            }
            Decision::deny()
        }

        Action::OpenConversationWith { counterpart_role } => {
            // Threads pair exactly one doctor with one patient.
            match (actor.role, counterpart_role) {
                (Doctor, Patient) | (Patient, Doctor) => {
                    Decision::allow(Reason::RolePermitted)
                }
                _ => Decision::deny(),
            }
        }

        Action::UseConversation {
            doctor_id,
            patient_id,
        } => {
            // Participants only; messaging is private even from admins.
            if actor.id == *doctor_id || actor.id == *patient_id {
                return Decision::allow(Reason::Participant);
            }
            Decision::deny()
        }

        Action::ViewProfile { owner_id } => {
            if actor.id == *owner_id {
                return Decision::allow(Reason::Owner);
            }
            if actor.role == Admin {
                return Decision::allow(Reason::AdminOverride);
            }
            Decision::deny()
        }

        Action::EditProfile { owner_id } => {
            // Self-service only. Admins suspend accounts, they do not edit them.
            if actor.id == *owner_id {
                return Decision::allow(Reason::Owner);
            }
            Decision::deny()
        }

        Action::RunTriage { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            Decision::deny()
        }

        Action::ViewAiSessions { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            Decision::deny()
        }

        Action::PlaceOrder { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            Decision::deny()
        }

        Action::ViewOrders { patient_id } => {
            if actor.role == Patient && actor.id == *patient_id {
                return Decision::allow(Reason::Owner);
            }
            if actor.role == Admin {
                return Decision::allow(Reason::AdminOverride);
            }
            Decision::deny()
        }

        Action::ManageCatalog | Action::ManageUsers => {
            if actor.role == Admin {
                return Decision::allow(Reason::RolePermitted);
            }
            Decision::deny()
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
