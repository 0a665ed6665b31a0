//! End-to-end installs against a mock release catalog

mod helper;

use std::sync::Arc;

use semver::Version;
use tempfile::TempDir;

use hc_install::error::{VerifyError, ValidationError};
use hc_install::source::{fs, releases};
use hc_install::version::VersionRequest;
use hc_install::{Error, Installer, Product, Source};

use helper::{CatalogFixture, FakeVerifier, zip_bytes};

const PRODUCT: &str = "hcfixture";

fn verified_options(fixture: &CatalogFixture) -> releases::ReleaseOptions {
    releases::ReleaseOptions {
        api_base_url: Some(fixture.url()),
        verifier: Some(Arc::new(FakeVerifier)),
        ..Default::default()
    }
}

fn missing_binary_lookup(dir: &TempDir) -> fs::AnyVersion {
    fs::AnyVersion {
        extra_paths: vec![dir.path().to_path_buf()],
        ..fs::AnyVersion::product(Product::new(PRODUCT))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn falls_back_from_lookup_to_verified_release_and_removes_it() {
    let mut fixture = CatalogFixture::new(PRODUCT).await;
    fixture.index(&["1.2.3", "1.3.0", "1.2.0"]).await;
    fixture.release("1.2.3", b"release 1.2.3").await;
    let empty = TempDir::new().unwrap();

    let latest = releases::LatestVersion {
        request: "~> 1.2.0".parse::<VersionRequest>().unwrap(),
        options: verified_options(&fixture),
        ..releases::LatestVersion::new(Product::new(PRODUCT))
    };

    let mut installer = Installer::new();
    let details = installer
        .ensure(vec![missing_binary_lookup(&empty).into(), latest.into()])
        .await
        .unwrap();

    assert_eq!(details.product, PRODUCT);
    assert_eq!(details.version, Some(Version::new(1, 2, 3)));
    assert!(details.executable_path.is_absolute());
    assert_eq!(
        std::fs::read(&details.executable_path).unwrap(),
        b"release 1.2.3"
    );

    installer.remove().await.unwrap();
    assert!(!details.executable_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn installs_exact_version_into_given_directory() {
    let mut fixture = CatalogFixture::new(PRODUCT).await;
    fixture.release("0.9.1", b"release 0.9.1").await;
    let install_dir = TempDir::new().unwrap();

    let exact = releases::ExactVersion {
        options: releases::ReleaseOptions {
            install_dir: Some(install_dir.path().to_path_buf()),
            ..verified_options(&fixture)
        },
        ..releases::ExactVersion::new(Product::new(PRODUCT), Version::new(0, 9, 1))
    };

    let mut installer = Installer::new();
    let details = installer.install(vec![Box::new(exact)]).await.unwrap();

    assert_eq!(
        details.executable_path,
        install_dir.path().join(fixture.binary_name())
    );

    installer.remove().await.unwrap();
    assert!(!details.executable_path.exists());
    assert!(install_dir.path().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_archive_is_fatal_and_leaves_nothing_behind() {
    let mut fixture = CatalogFixture::new(PRODUCT).await;
    let listed = zip_bytes(&[(fixture.binary_name().as_str(), b"original")]);
    let served = zip_bytes(&[(fixture.binary_name().as_str(), b"tampered")]);
    fixture
        .release_with("1.0.0", &listed, served, helper::TRUSTED_SIGNATURE)
        .await;
    let install_dir = TempDir::new().unwrap();
    let empty = TempDir::new().unwrap();

    let exact = releases::ExactVersion {
        options: releases::ReleaseOptions {
            install_dir: Some(install_dir.path().to_path_buf()),
            ..verified_options(&fixture)
        },
        ..releases::ExactVersion::new(Product::new(PRODUCT), Version::new(1, 0, 0))
    };

    let mut installer = Installer::new();
    let err = installer
        .ensure(vec![exact.into(), missing_binary_lookup(&empty).into()])
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Verify(VerifyError::ChecksumMismatch { .. })),
        "unexpected error: {err:?}"
    );
    assert!(!install_dir.path().join(fixture.binary_name()).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn untrusted_signature_is_fatal() {
    let mut fixture = CatalogFixture::new(PRODUCT).await;
    let archive = zip_bytes(&[(fixture.binary_name().as_str(), b"binary")]);
    fixture
        .release_with("1.0.0", &archive, archive.clone(), b"forged")
        .await;

    let exact = releases::ExactVersion {
        options: verified_options(&fixture),
        ..releases::ExactVersion::new(Product::new(PRODUCT), Version::new(1, 0, 0))
    };

    let mut installer = Installer::new();
    let err = installer.install(vec![Box::new(exact)]).await.unwrap_err();

    assert!(matches!(err, Error::Verify(VerifyError::BadSignature(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn skipping_verification_needs_no_key() {
    let mut fixture = CatalogFixture::new(PRODUCT).await;
    fixture.release("2.0.0", b"unsigned").await;

    let exact = releases::ExactVersion {
        options: releases::ReleaseOptions {
            api_base_url: Some(fixture.url()),
            skip_checksum_verification: true,
            ..Default::default()
        },
        ..releases::ExactVersion::new(Product::new(PRODUCT), Version::new(2, 0, 0))
    };

    let mut installer = Installer::new();
    let details = installer.install(vec![Box::new(exact)]).await.unwrap();
    assert_eq!(std::fs::read(&details.executable_path).unwrap(), b"unsigned");

    installer.remove().await.unwrap();
}

#[tokio::test]
async fn release_without_key_is_rejected_before_any_request() {
    let exact = releases::ExactVersion {
        options: releases::ReleaseOptions {
            api_base_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        },
        ..releases::ExactVersion::new(Product::new(PRODUCT), Version::new(1, 0, 0))
    };

    let mut installer = Installer::new();
    let err = installer
        .ensure(vec![Source::install(exact)])
        .await
        .unwrap_err();

    let Error::InvalidSources(errors) = err else {
        panic!("expected invalid sources, got {err:?}");
    };
    assert_eq!(errors, vec![ValidationError::MissingPublicKey]);
}
