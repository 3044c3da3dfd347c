//! Column registry for every table hepten produces.
//!
//! Each object type owns a fixed, ordered column schema. Buffers are indexed
//! by [`Column`] rather than by free-form strings; names only appear at the
//! storage boundary and in user configuration, where they are validated once.

use serde::{Deserialize, Serialize};

/// Electron mass hypothesis (GeV).
pub const ELECTRON_MASS: f64 = 0.0005109989461;

/// Muon mass hypothesis (GeV).
pub const MUON_MASS: f64 = 0.1056583715;

/// Reconstructed object types (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Reconstructed electrons.
    Electron,
    /// Tight-ID muons.
    MuonTight,
    /// Reconstructed photons.
    Photon,
    /// Missing transverse energy pseudo-object.
    #[serde(rename = "MissingET")]
    MissingEt,
    /// Calorimeter-flow photons.
    EFlowPhoton,
    /// Calorimeter-flow neutral hadrons.
    EFlowNeutralHadron,
    /// Charged tracks.
    EFlowTrack,
    /// Jets.
    Jet,
}

impl ObjectKind {
    /// All object types in table order.
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Electron,
        ObjectKind::MuonTight,
        ObjectKind::Photon,
        ObjectKind::MissingEt,
        ObjectKind::EFlowPhoton,
        ObjectKind::EFlowNeutralHadron,
        ObjectKind::EFlowTrack,
        ObjectKind::Jet,
    ];

    /// Types that count as leptons for selection and the leading-lepton reference.
    pub const LEPTONS: [ObjectKind; 2] = [ObjectKind::Electron, ObjectKind::MuonTight];

    /// Raw branch prefix and table key.
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Electron => "Electron",
            ObjectKind::MuonTight => "MuonTight",
            ObjectKind::Photon => "Photon",
            ObjectKind::MissingEt => "MissingET",
            ObjectKind::EFlowPhoton => "EFlowPhoton",
            ObjectKind::EFlowNeutralHadron => "EFlowNeutralHadron",
            ObjectKind::EFlowTrack => "EFlowTrack",
            ObjectKind::Jet => "Jet",
        }
    }

    /// Inverse of [`ObjectKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Position in [`ObjectKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Raw field holding the transverse magnitude (`PT`, `ET` or `MET`).
    pub fn magnitude_field(self) -> &'static str {
        match self {
            ObjectKind::MissingEt => "MET",
            ObjectKind::EFlowPhoton | ObjectKind::EFlowNeutralHadron => "ET",
            _ => "PT",
        }
    }

    /// Mass hypothesis used for the four-vector. Jets carry their own mass.
    pub fn mass(self) -> f64 {
        match self {
            ObjectKind::Electron => ELECTRON_MASS,
            ObjectKind::MuonTight => MUON_MASS,
            _ => 0.0,
        }
    }

    /// Type-specific observables copied verbatim from the raw record.
    pub fn raw_extras(self) -> &'static [Column] {
        match self {
            ObjectKind::Electron | ObjectKind::MuonTight => &[Column::Charge],
            ObjectKind::EFlowPhoton | ObjectKind::EFlowNeutralHadron => &[Column::Ehad, Column::Eem],
            ObjectKind::EFlowTrack => {
                &[Column::Charge, Column::X, Column::Y, Column::Z, Column::Dxy]
            }
            ObjectKind::Photon | ObjectKind::MissingEt | ObjectKind::Jet => &[],
        }
    }

    /// Extra columns in the output schema (raw extras plus track-matched attributes).
    pub fn extra_columns(self) -> &'static [Column] {
        match self {
            ObjectKind::Electron | ObjectKind::MuonTight | ObjectKind::EFlowTrack => {
                &[Column::Charge, Column::X, Column::Y, Column::Z, Column::Dxy]
            }
            other => other.raw_extras(),
        }
    }

    /// Whether objects of this type are matched to their nearest track.
    pub fn is_track_matched(self) -> bool {
        matches!(self, ObjectKind::Electron | ObjectKind::MuonTight)
    }

    /// Whether isolation scores are computed for this type.
    pub fn computes_isolation(self) -> bool {
        matches!(
            self,
            ObjectKind::Electron
                | ObjectKind::MuonTight
                | ObjectKind::Photon
                | ObjectKind::EFlowPhoton
                | ObjectKind::EFlowNeutralHadron
        )
    }

    /// Output column schema, in storage order.
    pub fn schema(self) -> Vec<Column> {
        if self == ObjectKind::Jet {
            let mut cols = vec![Column::Entry, Column::Energy, Column::Px, Column::Py, Column::Pz];
            cols.extend_from_slice(&JET_RAW);
            return cols;
        }
        let mut cols = COMMON.to_vec();
        cols.extend_from_slice(self.extra_columns());
        cols.extend(ISOLATION_PAIRS.iter().map(|(c, _)| *c));
        cols
    }

    /// Raw fields read for this type (the `<Object>.<Field>` suffixes).
    pub fn raw_fields(self) -> Vec<&'static str> {
        if self == ObjectKind::Jet {
            return JET_RAW.iter().map(|c| c.name()).collect();
        }
        let mut out = vec![self.magnitude_field(), "Eta", "Phi"];
        out.extend(self.raw_extras().iter().map(|c| c.name()));
        out
    }
}

/// Build the raw field name `<Object>.<Field>`.
pub fn field_name(kind: ObjectKind, field: &str) -> String {
    format!("{}.{}", kind.name(), field)
}

macro_rules! columns {
    ($($(#[$doc:meta])* $variant:ident => $name:literal),+ $(,)?) => {
        /// Every column that can appear in an object table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Column {
            $($(#[$doc])* $variant),+
        }

        impl Column {
            /// All columns, in declaration order.
            pub const ALL: &'static [Column] = &[$(Column::$variant),+];

            /// Storage name of the column.
            pub fn name(self) -> &'static str {
                match self {
                    $(Column::$variant => $name),+
                }
            }
        }
    };
}

columns! {
    /// Contiguous kept-event number.
    Entry => "Entry",
    /// Four-vector energy.
    Energy => "Energy",
    /// Momentum x component.
    Px => "Px",
    /// Momentum y component.
    Py => "Py",
    /// Momentum z component.
    Pz => "Pz",
    /// Transverse momentum or energy of a non-jet object.
    PtOrEt => "PT_or_ET",
    /// Jet transverse momentum.
    Pt => "PT",
    /// Pseudorapidity.
    Eta => "Eta",
    /// Azimuthal angle.
    Phi => "Phi",
    MaxLepDeltaEta => "MaxLepDeltaEta",
    MaxLepDeltaPhi => "MaxLepDeltaPhi",
    MaxLepDeltaR => "MaxLepDeltaR",
    MaxLepKt => "MaxLepKt",
    MaxLepAntiKt => "MaxLepAntiKt",
    MetDeltaEta => "METDeltaEta",
    MetDeltaPhi => "METDeltaPhi",
    MetDeltaR => "METDeltaR",
    MetKt => "METKt",
    MetAntiKt => "METAntiKt",
    Charge => "Charge",
    X => "X",
    Y => "Y",
    Z => "Z",
    Dxy => "Dxy",
    Ehad => "Ehad",
    Eem => "Eem",
    MuIso => "MuIso",
    EleIso => "EleIso",
    ChHadIso => "ChHadIso",
    NeuHadIso => "NeuHadIso",
    GammaIso => "GammaIso",
    Mass => "Mass",
    Flavor => "Flavor",
    FlavorAlgo => "FlavorAlgo",
    FlavorPhys => "FlavorPhys",
    BTag => "BTag",
    BTagAlgo => "BTagAlgo",
    BTagPhys => "BTagPhys",
    TauTag => "TauTag",
    EhadOverEem => "EhadOverEem",
    NCharged => "NCharged",
    NNeutrals => "NNeutrals",
    Beta => "Beta",
    BetaStar => "BetaStar",
    MeanSqDeltaR => "MeanSqDeltaR",
    Ptd => "PTD",
    NSubJetsTrimmed => "NSubJetsTrimmed",
    NSubJetsPruned => "NSubJetsPruned",
    NSubJetsSoftDropped => "NSubJetsSoftDropped",
}

impl Column {
    /// Inverse of [`Column::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Position in [`Column::ALL`]; used for dense lookup tables.
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

const COMMON: [Column; 18] = [
    Column::Entry,
    Column::Energy,
    Column::Px,
    Column::Py,
    Column::Pz,
    Column::PtOrEt,
    Column::Eta,
    Column::Phi,
    Column::MaxLepDeltaEta,
    Column::MaxLepDeltaPhi,
    Column::MaxLepDeltaR,
    Column::MaxLepKt,
    Column::MaxLepAntiKt,
    Column::MetDeltaEta,
    Column::MetDeltaPhi,
    Column::MetDeltaR,
    Column::MetKt,
    Column::MetAntiKt,
];

const JET_RAW: [Column; 22] = [
    Column::Pt,
    Column::Eta,
    Column::Phi,
    Column::Mass,
    Column::Flavor,
    Column::FlavorAlgo,
    Column::FlavorPhys,
    Column::BTag,
    Column::BTagAlgo,
    Column::BTagPhys,
    Column::TauTag,
    Column::Charge,
    Column::EhadOverEem,
    Column::NCharged,
    Column::NNeutrals,
    Column::Beta,
    Column::BetaStar,
    Column::MeanSqDeltaR,
    Column::Ptd,
    Column::NSubJetsTrimmed,
    Column::NSubJetsPruned,
    Column::NSubJetsSoftDropped,
];

/// Isolation columns and the reference collection each one sums over.
pub const ISOLATION_PAIRS: [(Column, ObjectKind); 5] = [
    (Column::MuIso, ObjectKind::MuonTight),
    (Column::EleIso, ObjectKind::Electron),
    (Column::ChHadIso, ObjectKind::EFlowTrack),
    (Column::NeuHadIso, ObjectKind::EFlowNeutralHadron),
    (Column::GammaIso, ObjectKind::EFlowPhoton),
];

/// Event-level aggregate columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventColumn {
    /// Contiguous kept-event number.
    Entry,
    /// Missing transverse energy magnitude.
    Met,
    /// Scalar sum of jet PT.
    Ht,
    /// Number of muons.
    MuonMul,
    /// Number of electrons.
    ElectronMul,
    /// Number of jets.
    JetMul,
    /// Leading jet PT.
    MaxJetPt,
    /// Leading lepton PT.
    MaxLepPt,
}

impl EventColumn {
    /// All aggregate columns in storage order.
    pub const ALL: [EventColumn; 8] = [
        EventColumn::Entry,
        EventColumn::Met,
        EventColumn::Ht,
        EventColumn::MuonMul,
        EventColumn::ElectronMul,
        EventColumn::JetMul,
        EventColumn::MaxJetPt,
        EventColumn::MaxLepPt,
    ];

    /// Storage name.
    pub fn name(self) -> &'static str {
        match self {
            EventColumn::Entry => "Entry",
            EventColumn::Met => "MET",
            EventColumn::Ht => "HT",
            EventColumn::MuonMul => "MuonMul",
            EventColumn::ElectronMul => "ElectronMul",
            EventColumn::JetMul => "JetMul",
            EventColumn::MaxJetPt => "MaxJetPT",
            EventColumn::MaxLepPt => "MaxLepPT",
        }
    }
}

/// Keys of the tables written for every converted raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// Per-object-type feature table.
    Object(ObjectKind),
    /// Event-level aggregates.
    EventChars,
    /// Per-event, per-type object counts.
    NumValues,
}

impl TableKey {
    /// Every table a complete store holds.
    pub fn all() -> Vec<TableKey> {
        let mut keys: Vec<TableKey> = ObjectKind::ALL.into_iter().map(TableKey::Object).collect();
        keys.push(TableKey::EventChars);
        keys.push(TableKey::NumValues);
        keys
    }

    /// Storage name.
    pub fn name(self) -> &'static str {
        match self {
            TableKey::Object(kind) => kind.name(),
            TableKey::EventChars => "EventChars",
            TableKey::NumValues => "NumValues",
        }
    }

    /// Inverse of [`TableKey::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EventChars" => Some(TableKey::EventChars),
            "NumValues" => Some(TableKey::NumValues),
            other => ObjectKind::from_name(other).map(TableKey::Object),
        }
    }

    /// Column names of this table, in storage order.
    pub fn column_names(self) -> Vec<&'static str> {
        match self {
            TableKey::Object(kind) => kind.schema().iter().map(|c| c.name()).collect(),
            TableKey::EventChars => EventColumn::ALL.iter().map(|c| c.name()).collect(),
            TableKey::NumValues => ObjectKind::ALL.iter().map(|k| k.name()).collect(),
        }
    }
}
