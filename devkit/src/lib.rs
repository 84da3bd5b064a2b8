/*!
# Feeder DevKit - Télémétrie simulée pour le kernel feeder

Outils de développement sans poteaux réels :
- Construction des payloads `scada/poles/{id}` (même contrat que le terrain)
- Scénarios prêts à l'emploi (données d'échantillon, défaut simulé, perte source)
- Stub MQTT pour tester sans broker
- Binaire `feeder-sim` pour alimenter un kernel lancé localement
*/

pub mod mqtt_stub;
pub mod scenarios;
pub mod telemetry;

pub use mqtt_stub::{publish_payloads, FeedPublisher, MockMqttClient};
pub use scenarios::Scenario;
pub use telemetry::{pole_topic, PolePayload, TelemetryBuilder};
