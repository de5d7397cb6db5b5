pub mod course;
pub mod location;
pub mod mycourse;
pub mod password_reset;
pub mod profile;
pub mod user;

pub use course::{Course, CourseForm, CourseInput, CourseLevel};
pub use location::{Location, LocationForm, LocationUpdate, TRAVEL_DISTANCES};
pub use mycourse::{MyCourseEntry, MyCourseForm, Mycourse, NewEnrollment, COST_RANGES};
pub use password_reset::PasswordResetToken;
pub use profile::{
    GuardianDetails, PersonalDetails, PersonalInfoForm, Profile, ProfileError, Student, Tutor,
    STATES,
};
pub use user::{Role, UnknownRole, User};
