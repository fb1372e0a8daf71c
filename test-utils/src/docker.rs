use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

pub const BIGTABLE_EMULATOR_PORT: u16 = 8086;

pub async fn bigtable_emulator() -> ContainerAsync<GenericImage> {
  let wait_for = WaitFor::message_on_stderr("Cloud Bigtable emulator running");
  GenericImage::new("gcr.io/google.com/cloudsdktool/google-cloud-cli", "emulators")
    .with_exposed_port(BIGTABLE_EMULATOR_PORT.tcp())
    .with_wait_for(wait_for)
    .with_cmd([
      "gcloud",
      "beta",
      "emulators",
      "bigtable",
      "start",
      "--host-port=0.0.0.0:8086",
    ])
    .start()
    .await
    .expect("failed to start Bigtable emulator")
}
