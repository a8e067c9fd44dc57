// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Identifiers of the entities a sorting problem talks about.
use crate::macros::id_type;

id_type! {
    /// A decision maker, i.e. one holder of preferences.
    DecisionMaker
}

id_type! {
    /// A criterion along which alternatives are evaluated.
    Criterion
}

id_type! {
    /// An alternative, or a category profile used as a reference alternative.
    Alternative
}
