//! SP1 proving engine for the withdraw program.

use std::fs;

use anyhow::{Context, Result};
use masked_pool_lib::{PublicSignals, WithdrawWitness};
use masked_pool_pipeline::{Groth16Proof, ProofBundle, ProverError, ProvingEngine};
use sp1_sdk::{
    include_elf, HashableKey, ProverClient, SP1ProofWithPublicValues, SP1ProvingKey,
    SP1PublicValues, SP1Stdin, SP1VerifyingKey,
};
use tracing::{debug, info};

use crate::config::ProverConfig;

pub const WITHDRAW_ELF: &[u8] = include_elf!("withdraw-program");

// Type alias: ProverClient::from_env() returns EnvProver
type Client = sp1_sdk::EnvProver;

pub struct Sp1Engine {
    client: Client,
    elf: Vec<u8>,
    pk: SP1ProvingKey,
    vk: SP1VerifyingKey,
    preflight: bool,
}

impl Sp1Engine {
    pub fn new(config: &ProverConfig) -> Result<Self> {
        let elf = match &config.withdraw_elf {
            Some(path) => fs::read(path)
                .with_context(|| format!("cannot read WITHDRAW_ELF {}", path.display()))?,
            None => WITHDRAW_ELF.to_vec(),
        };
        let client = ProverClient::from_env();
        let (pk, vk) = client.setup(&elf);
        info!(vkey = %vk.bytes32(), "withdraw program loaded");
        Ok(Self {
            client,
            elf,
            pk,
            vk,
            preflight: config.preflight_execute,
        })
    }
}

impl ProvingEngine for Sp1Engine {
    type Proof = SP1ProofWithPublicValues;

    fn vkey_digest(&self) -> String {
        self.vk.bytes32()
    }

    fn prove(&self, witness: &WithdrawWitness) -> Result<ProofBundle<Self::Proof>, ProverError> {
        let mut stdin = SP1Stdin::new();
        stdin.write(witness);

        // Constraint check without proof generation.
        if self.preflight {
            let (_, report) = self
                .client
                .execute(&self.elf, &stdin)
                .run()
                .map_err(|e| ProverError::Unsatisfied(e.to_string()))?;
            debug!(cycles = report.total_instruction_count(), "preflight execution succeeded");
        }

        let proof = self
            .client
            .prove(&self.pk, &stdin)
            .groth16()
            .run()
            .map_err(|e| ProverError::Backend(e.to_string()))?;
        let public_signals = PublicSignals::decode(proof.public_values.as_slice())
            .map_err(|e| ProverError::Encoding(e.to_string()))?;

        Ok(ProofBundle {
            proof,
            public_signals,
        })
    }

    fn verify(&self, bundle: &ProofBundle<Self::Proof>) -> bool {
        // The bundle's signals, not the ones the proof carries, are checked.
        let mut proof = bundle.proof.clone();
        proof.public_values = SP1PublicValues::from(&bundle.public_signals.encode()[..]);
        self.client.verify(&proof, &self.vk).is_ok()
    }

    fn encode_proof(&self, proof: &Self::Proof) -> Result<Groth16Proof, ProverError> {
        Groth16Proof::from_sp1_bytes(&proof.bytes())
    }
}
