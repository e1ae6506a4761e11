//! Static descriptions of the input fields and the diagnoses the model knows.
//!
//! These tables drive the home page form and the `/feature_ranges`
//! endpoint. They are built once and never mutated, and serialize in
//! declaration order so repeated responses are byte-identical.
use lazy_static::lazy_static;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Metadata for a single input field
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub emoji: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
    pub description: &'static str,
}

impl FieldInfo {
    fn ranged(
        name: &'static str,
        emoji: &'static str,
        min: i64,
        max: i64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            emoji,
            min: Some(min),
            max: Some(max),
            options: None,
            description,
        }
    }

    fn choice(
        name: &'static str,
        emoji: &'static str,
        options: Vec<&'static str>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            emoji,
            min: None,
            max: None,
            options: Some(options),
            description,
        }
    }
}

/// Display metadata for a diagnosis label
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiseaseInfo {
    pub emoji: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

/// Fallback for labels the catalog does not describe
pub const UNKNOWN_DISEASE: DiseaseInfo = DiseaseInfo {
    emoji: "❓",
    color: "#9E9E9E",
    description: "Unknown disease",
};

/// Insertion-ordered table keyed by field or disease name.
#[derive(Debug, Clone)]
pub struct Table<T> {
    entries: Vec<(&'static str, T)>,
}

impl<T> Table<T> {
    fn new(entries: Vec<(&'static str, T)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &T)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

lazy_static! {
    /// Symptom severities, all on a 0-3 scale
    pub static ref SYMPTOM_INFO: Table<FieldInfo> = Table::new(vec![
        ("fever", FieldInfo::ranged("Fever", "🌡️", 0, 3, "Body temperature abnormality")),
        ("cough", FieldInfo::ranged("Cough", "🤧", 0, 3, "Cough severity")),
        ("fatigue", FieldInfo::ranged("Fatigue", "😴", 0, 3, "Tiredness level")),
        ("headache", FieldInfo::ranged("Headache", "🤕", 0, 3, "Head pain intensity")),
        ("muscle_pain", FieldInfo::ranged("Muscle Pain", "💪", 0, 3, "Muscle ache severity")),
        ("nausea", FieldInfo::ranged("Nausea", "🤢", 0, 3, "Feeling sick")),
        ("vomiting", FieldInfo::ranged("Vomiting", "🤮", 0, 3, "Vomiting frequency")),
        ("diarrhea", FieldInfo::ranged("Diarrhea", "🚽", 0, 3, "Diarrhea severity")),
        ("skin_rash", FieldInfo::ranged("Skin Rash", "🔴", 0, 3, "Skin condition")),
        ("loss_smell", FieldInfo::ranged("Loss of Smell", "👃", 0, 3, "Smell impairment")),
        ("loss_taste", FieldInfo::ranged("Loss of Taste", "👅", 0, 3, "Taste impairment")),
    ]);

    /// Demographics and vital signs
    pub static ref VITAL_INFO: Table<FieldInfo> = Table::new(vec![
        ("age", FieldInfo::ranged("Age", "🎂", 0, 100, "Patient age")),
        ("gender", FieldInfo::choice("Gender", "👤", vec!["Male", "Female"], "Patient gender")),
        ("systolic_bp", FieldInfo::ranged("Systolic BP", "💓", 80, 200, "Upper blood pressure")),
        ("diastolic_bp", FieldInfo::ranged("Diastolic BP", "💗", 40, 120, "Lower blood pressure")),
        ("heart_rate", FieldInfo::ranged("Heart Rate", "❤️", 40, 150, "Beats per minute")),
        ("temperature_c", FieldInfo::ranged("Temperature", "🌡️", 34, 42, "Body temperature (°C)")),
        ("oxygen_saturation", FieldInfo::ranged("Oxygen Saturation", "🫁", 85, 100, "Blood oxygen level")),
    ]);

    /// Blood panel values
    pub static ref LAB_INFO: Table<FieldInfo> = Table::new(vec![
        ("wbc_count", FieldInfo::ranged("WBC Count", "🔬", 2, 15, "White blood cells")),
        ("hemoglobin", FieldInfo::ranged("Hemoglobin", "🩸", 8, 18, "Blood protein level")),
        ("platelet_count", FieldInfo::ranged("Platelet Count", "🧫", 50, 500, "Platelets in blood")),
        ("crp_level", FieldInfo::ranged("CRP Level", "📊", 0, 30, "Inflammation marker")),
        ("glucose_level", FieldInfo::ranged("Glucose Level", "🍬", 50, 200, "Blood sugar level")),
    ]);

    pub static ref DISEASE_INFO: Table<DiseaseInfo> = Table::new(vec![
        ("COVID-19", DiseaseInfo { emoji: "🦠", color: "#FF6B6B", description: "Coronavirus disease" }),
        ("Dengue", DiseaseInfo { emoji: "🦟", color: "#FFA726", description: "Mosquito-borne viral infection" }),
        ("Influenza", DiseaseInfo { emoji: "🤒", color: "#42A5F5", description: "Seasonal flu virus" }),
        ("Malaria", DiseaseInfo { emoji: "🌡️", color: "#66BB6A", description: "Parasitic disease from mosquitoes" }),
        ("Pneumonia", DiseaseInfo { emoji: "🫁", color: "#AB47BC", description: "Lung inflammation infection" }),
    ]);
}

/// Look up display metadata, falling back to [`UNKNOWN_DISEASE`]
pub fn disease_info(label: &str) -> &'static DiseaseInfo {
    DISEASE_INFO.get(label).unwrap_or(&UNKNOWN_DISEASE)
}

/// Body of `GET /feature_ranges`
#[derive(Debug, Serialize)]
pub struct FeatureRanges {
    pub symptoms: &'static Table<FieldInfo>,
    pub vitals: &'static Table<FieldInfo>,
    pub lab_tests: &'static Table<FieldInfo>,
}

impl FeatureRanges {
    pub fn current() -> Self {
        Self {
            symptoms: &*SYMPTOM_INFO,
            vitals: &*VITAL_INFO,
            lab_tests: &*LAB_INFO,
        }
    }
}
