/*!
# LoadGrid DevKit - Canal simulé et utilitaires de test

Bibliothèque facilitant le test de la console sans plan de contrôle réel:
- Canal simulé (frames entrantes, lots de commandes sortants)
- Builders d'enveloppes `init` / `notify`
- Harness de test avec assertions sur la flotte et les commandes
*/

pub mod envelope_builder;
pub mod mock_channel;
pub mod test_utils;

pub use envelope_builder::EnvelopeBuilder;
pub use mock_channel::MockChannel;
pub use test_utils::TestHarness;
