// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod clock;
pub mod credentials;
pub mod dispatch;
pub mod host_store;
pub mod job_store;
pub mod notifications;
pub mod object_storage;
pub mod remote_session;

pub use clock::ClockPort;
pub use credentials::CredentialStorePort;
pub use dispatch::JobDispatchPort;
pub use host_store::HostStorePort;
pub use job_store::{ClaimOutcome, JobStorePort};
pub use notifications::{NotificationPort, NotificationSubject, StatusEvent};
pub use object_storage::{ByteStream, ObjectStoragePort, ObjectStorageProvider};
pub use remote_session::{
    AuthMethod, ConnectionDescriptor, RemoteSession, SessionConnectorPort, SessionError,
    SessionProtocol, TransferOperation, UploadSource,
};
