use crate::NeuronId;

/// Structural errors detected while building or
/// loading a genome.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    /// A neuron with the same id is already in the genome.
    #[error("duplicate neuron insertion with id {0}")]
    DuplicateNeuron(NeuronId),
    /// A link with the same endpoints is already in the genome.
    #[error("duplicate link insertion between endpoints {0} -> {1}")]
    DuplicateLink(NeuronId, NeuronId),
    /// One or both endpoints of a link are missing.
    #[error("link insertion between nonexistent endpoint(s) {0} -> {1}")]
    NonexistentEndpoint(NeuronId, NeuronId),
    /// The input slice does not match the genome's input count.
    #[error("expected {expected} inputs, found {found}")]
    InputLength { expected: usize, found: usize },
    /// A deserialized genome violates a structural invariant.
    #[error("malformed genome: {0}")]
    MalformedGenome(String),
}
