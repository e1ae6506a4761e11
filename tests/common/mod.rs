//! Common test utilities
//!
//! Generates a small synthetic patient dataset where each diagnosis has a
//! recognisable symptom, vital and lab profile, and trains a quick model
//! on it.

#![allow(dead_code)]

use dx_predictor::config::TrainingConfig;
use dx_predictor::ml::{DiagnosisService, ModelArtifacts, PatientDataset, TrainingPipeline, TrainingReport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

pub const DISEASES: [&str; 5] = ["COVID-19", "Dengue", "Influenza", "Malaria", "Pneumonia"];

const HEADER: &str = "patient_id,fever,cough,fatigue,headache,muscle_pain,nausea,vomiting,diarrhea,skin_rash,loss_smell,loss_taste,age,gender,systolic_bp,diastolic_bp,heart_rate,temperature_c,oxygen_saturation,wbc_count,hemoglobin,platelet_count,crp_level,glucose_level,diagnosis";

/// Symptom levels (11), then temperature, oxygen, platelets, crp
fn profile(disease: &str) -> ([u8; 11], f64, f64, f64, f64) {
    match disease {
        "COVID-19" => ([2, 2, 2, 1, 1, 0, 0, 0, 0, 3, 3], 38.2, 93.0, 220.0, 12.0),
        "Dengue" => ([3, 0, 2, 3, 3, 2, 1, 0, 3, 0, 0], 39.3, 97.0, 80.0, 8.0),
        "Influenza" => ([2, 3, 2, 2, 2, 0, 0, 0, 0, 0, 0], 38.6, 96.0, 240.0, 6.0),
        "Malaria" => ([3, 0, 3, 2, 1, 3, 3, 1, 0, 0, 0], 40.1, 96.0, 150.0, 15.0),
        _ => ([2, 3, 2, 0, 1, 0, 0, 0, 0, 0, 0], 38.8, 88.0, 260.0, 25.0),
    }
}

/// Render `n_per_class` noisy rows per diagnosis as CSV
pub fn synthetic_csv(n_per_class: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lines = vec![HEADER.to_string()];
    let mut id = 0;

    for disease in DISEASES {
        let (symptoms, temp, oxygen, platelets, crp) = profile(disease);
        for _ in 0..n_per_class {
            id += 1;
            let mut cells = vec![id.to_string()];
            for level in symptoms {
                let jitter: i8 = rng.gen_range(-1..=1);
                let value = (level as i8 + if rng.gen_bool(0.3) { jitter } else { 0 }).clamp(0, 3);
                cells.push(value.to_string());
            }
            cells.push(rng.gen_range(5..90).to_string());
            cells.push(if rng.gen_bool(0.5) { "Male" } else { "Female" }.to_string());
            cells.push(rng.gen_range(100..150).to_string());
            cells.push(rng.gen_range(60..95).to_string());
            cells.push(rng.gen_range(60..120).to_string());
            cells.push(format!("{:.1}", temp + rng.gen_range(-0.4..0.4)));
            cells.push(format!("{:.0}", oxygen + rng.gen_range(-1.5..1.5)));
            cells.push(format!("{:.1}", rng.gen_range(4.0..11.0)));
            cells.push(format!("{:.1}", rng.gen_range(11.0..16.0)));
            cells.push(format!("{:.0}", platelets + rng.gen_range(-20.0..20.0)));
            cells.push(format!("{:.1}", crp + rng.gen_range(-2.0..2.0)));
            cells.push(rng.gen_range(70..140).to_string());
            cells.push(disease.to_string());
            lines.push(cells.join(","));
        }
    }

    lines.join("\n")
}

pub fn synthetic_dataset(n_per_class: usize) -> PatientDataset {
    PatientDataset::parse_csv(&synthetic_csv(n_per_class, 7)).unwrap()
}

/// Small but deterministic training settings
pub fn fast_config() -> TrainingConfig {
    TrainingConfig {
        n_estimators: 25,
        ..TrainingConfig::default()
    }
}

pub fn train(n_per_class: usize) -> (ModelArtifacts, TrainingReport) {
    TrainingPipeline::new(fast_config())
        .run(&synthetic_dataset(n_per_class), "synthetic")
        .unwrap()
}

pub fn trained_service() -> DiagnosisService {
    let (artifacts, _) = train(30);
    DiagnosisService::from_artifacts(artifacts).unwrap()
}

/// A full request record typical of the given diagnosis
pub fn typical_request(disease: &str) -> Map<String, Value> {
    let (symptoms, temp, oxygen, platelets, crp) = profile(disease);
    let names = [
        "fever", "cough", "fatigue", "headache", "muscle_pain", "nausea", "vomiting", "diarrhea",
        "skin_rash", "loss_smell", "loss_taste",
    ];

    let mut record = Map::new();
    for (name, level) in names.iter().zip(symptoms) {
        record.insert(name.to_string(), Value::from(level));
    }
    record.insert("age".into(), Value::from(45));
    record.insert("gender".into(), Value::from("Female"));
    record.insert("systolic_bp".into(), Value::from(120));
    record.insert("diastolic_bp".into(), Value::from(80));
    record.insert("heart_rate".into(), Value::from(90));
    record.insert("temperature_c".into(), Value::from(temp));
    record.insert("oxygen_saturation".into(), Value::from(oxygen));
    record.insert("wbc_count".into(), Value::from(7.5));
    record.insert("hemoglobin".into(), Value::from(13.5));
    record.insert("platelet_count".into(), Value::from(platelets));
    record.insert("crp_level".into(), Value::from(crp));
    record.insert("glucose_level".into(), Value::from(100));
    record
}
