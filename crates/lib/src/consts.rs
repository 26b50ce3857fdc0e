//! Shared constants.

/// Application name, used for default directories.
pub const APP_NAME: &str = "dbd";

/// Repository prefix used when naming built images.
pub const DEFAULT_REPOSITORY: &str = "dbd";

/// Default maximum number of regular files kept in the stage cache.
pub const DEFAULT_CACHE_SIZE: usize = 15;

/// Environment variable overriding the resource directory.
pub const RESOURCE_PATH_ENV: &str = "DBD_RESOURCE_PATH";

/// Environment variable overriding the container engine binary.
pub const DOCKER_ENV: &str = "DBD_DOCKER";

/// Length of truncated hashes used in image tags.
pub const ID_HASH_PREFIX_LEN: usize = 20;

// Per-component resource files.
pub const ASSEMBLY_FILE: &str = "assembly.yaml";
pub const COMPOSE_PART_FILE: &str = "docker-compose_part.yaml";
pub const CONFIG_PART_FILE: &str = "compose-config_part";
pub const DOCKER_CONTEXT_DIR: &str = "docker_context";
pub const SCRIPTS_DIR: &str = "scripts";
pub const SECURE_VARIANT_DIR: &str = "kerberos";
pub const UNSECURE_VARIANT_DIR: &str = "unsecure";

/// Directory inside the docker build context that receives the component artifact.
pub const GENERATED_DIR_NAME: &str = "generated";

// Output directory contents.
pub const COMPOSE_FILE: &str = "docker-compose.yaml";
pub const CONFIG_FILE: &str = "compose-config";
pub const ENV_FILE: &str = ".env";
pub const REPORT_FILE: &str = "output_configuration.yaml";
pub const COMPOSE_FILE_VERSION: &str = "3";

// Service added to the manifest when security is enabled.
pub const KERBEROS_SERVICE: &str = "krb5";
pub const KERBEROS_IMAGE: &str = "flokkr/krb5";
