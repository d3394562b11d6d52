use sea_query::Iden;

#[derive(Iden, Clone)]
pub enum IdempotencyKeys {
    Table,
    Key,
    SubmissionId,
    CreatedAt,
    ExpiresAt,
}

#[derive(Iden, Clone)]
pub enum DispatchRecords {
    Table,
    SubmissionId,
    FormType,
    Status,
    Attempts,
    LastError,
    NotificationStatus,
    NotificationAttempts,
    NotificationError,
    StorageStatus,
    StorageAttempts,
    StorageError,
    Payload,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone)]
pub enum ContactSubmissions {
    Table,
    Id,
    Name,
    Email,
    Phone,
    Subject,
    Message,
    CreatedAt,
}

#[derive(Iden, Clone)]
pub enum QuoteSubmissions {
    Table,
    Id,
    EquipmentType,
    Name,
    Email,
    Fields,
    CreatedAt,
}
