//! # Maximum Entropy (Regressão Logística) para Pares de Nomes
//!
//! Classificador discriminativo binário: dado o vetor de features de um par
//! (menção, sinônimo), estima a probabilidade de os dois nomes designarem o
//! mesmo gene.
//!
//! ## Algoritmo
//! - **Treinamento**: Stochastic Gradient Descent (SGD) com regularização L2.
//! - **Predição**: $P(\text{match} \mid x) = \sigma(w \cdot x)$.
//!
//! O modelo é serializado em JSON. Um modelo padrão acompanha o crate
//! (`resources/maxent_scorer.json`) e pode ser trocado por um arquivo próprio.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GeneMappingError, Result};
use crate::features::FeatureVector;

const BUNDLED_MODEL: &str = include_str!("../resources/maxent_scorer.json");

/// Um exemplo de treino: features do par e se os nomes são do mesmo gene.
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub is_match: bool,
}

/// Modelo de Entropia Máxima com duas classes (equivalente à regressão logística).
///
/// # Fórmula
/// $$ P(\text{match} \mid x) = \frac{1}{1 + \exp(-\sum_i w_i f_i(x))} $$
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxEntModel {
    /// Peso por nome de feature. Positivo favorece "mesmo gene".
    pub weights: HashMap<String, f64>,
}

impl MaxEntModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modelo embutido no crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_MODEL)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: MaxEntModel = serde_json::from_str(json)?;
        if model.weights.is_empty() {
            return Err(GeneMappingError::Resource("maxent model has no weights".into()));
        }
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            GeneMappingError::Resource(format!("cannot read maxent model {}: {e}", path.display()))
        })?;
        let model = Self::from_json(&json)?;
        info!(path = %path.display(), features = model.weights.len(), "maxent model loaded");
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Probabilidade de o par ser do mesmo gene.
    pub fn probability(&self, fv: &FeatureVector) -> f64 {
        sigmoid(fv.dot(&self.weights))
    }

    /// Treina com **SGD**.
    ///
    /// # Parâmetros
    /// * `examples` - Pares rotulados.
    /// * `iterations` - Número de épocas.
    /// * `learning_rate` ($\eta$) - Tamanho do passo do gradiente.
    /// * `lambda` ($\lambda$) - Fator de regularização L2.
    pub fn train(&mut self, examples: &[TrainingExample], iterations: usize, learning_rate: f64, lambda: f64) {
        for epoch in 0..iterations {
            let mut correct = 0;
            for example in examples {
                let p = self.probability(&example.features);
                let target = if example.is_match { 1.0 } else { 0.0 };
                if (p >= 0.5) == example.is_match {
                    correct += 1;
                }
                // w = w + rate * (erro * f - lambda * w)
                let error = target - p;
                for (name, value) in &example.features.features {
                    let w = self.weights.entry(name.clone()).or_insert(0.0);
                    *w += learning_rate * (error * value - lambda * *w);
                }
            }
            if epoch % 5 == 0 && !examples.is_empty() {
                debug!(
                    epoch,
                    accuracy = correct as f64 / examples.len() as f64,
                    "maxent training"
                );
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
