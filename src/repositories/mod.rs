pub mod user_repository;

pub use user_repository::{
    NewUser, RepositoryError, SqliteUserRepository, UserFilter, UserRepository,
};
