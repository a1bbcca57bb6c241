// Row-level authorization: one predicate per entity, evaluated against the
// caller's standing in the course the entity belongs to.

use uuid::Uuid;

use crate::auth::Caller;
use crate::db::Store;
use crate::error::ApiError;
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Owner,
    Enrolled,
    Outsider,
}

pub trait Guarded {
    const KIND: &'static str;

    fn permits(&self, caller: Uuid, standing: Standing, access: Access) -> bool;
}

impl Guarded for Course {
    const KIND: &'static str = "course";

    fn permits(&self, _caller: Uuid, standing: Standing, access: Access) -> bool {
        match standing {
            Standing::Owner => true,
            Standing::Enrolled => access == Access::Read,
            Standing::Outsider => false,
        }
    }
}

impl Guarded for Activity {
    const KIND: &'static str = "activity";

    fn permits(&self, _caller: Uuid, standing: Standing, access: Access) -> bool {
        match standing {
            Standing::Owner => true,
            Standing::Enrolled => access == Access::Read && self.status.visible_to_students(),
            Standing::Outsider => false,
        }
    }
}

impl Guarded for ActivityRun {
    const KIND: &'static str = "run";

    fn permits(&self, caller: Uuid, standing: Standing, access: Access) -> bool {
        match standing {
            Standing::Owner => access == Access::Read,
            Standing::Enrolled => self.student_id == caller,
            // A student who left the course keeps read access to their own history.
            Standing::Outsider => access == Access::Read && self.student_id == caller,
        }
    }
}

impl Guarded for Assessment {
    const KIND: &'static str = "assessment";

    fn permits(&self, caller: Uuid, standing: Standing, access: Access) -> bool {
        access == Access::Read
            && match standing {
                Standing::Owner => true,
                Standing::Enrolled | Standing::Outsider => self.student_id == caller,
            }
    }
}

pub async fn standing(store: &dyn Store, caller: &Caller, course: &Course) -> Result<Standing, ApiError> {
    if course.teacher_id == caller.id {
        return Ok(Standing::Owner);
    }
    Ok(match store.enrollment(course.id, caller.id).await? {
        Some(_) => Standing::Enrolled,
        None => Standing::Outsider,
    })
}

pub fn authorize<T: Guarded>(entity: &T, caller: &Caller, standing: Standing, access: Access) -> Result<(), ApiError> {
    if entity.permits(caller.id, standing, access) {
        Ok(())
    } else {
        let verb = match access {
            Access::Read => "read",
            Access::Write => "modify",
        };
        Err(ApiError::forbidden(format!("not allowed to {verb} this {}", T::KIND)))
    }
}

/// The caller's profile; callers that never created one may not act by role.
pub async fn profile_of(store: &dyn Store, caller: &Caller) -> Result<Profile, ApiError> {
    store
        .profile(caller.id)
        .await?
        .ok_or_else(|| ApiError::forbidden("create a profile first"))
}

// --- loaders: fetch an entity with its course and enforce the predicate ---

pub async fn course(store: &dyn Store, caller: &Caller, id: Uuid, access: Access) -> Result<(Course, Standing), ApiError> {
    let course = store.course(id).await?.ok_or(ApiError::NotFound("course"))?;
    let standing = standing(store, caller, &course).await?;
    authorize(&course, caller, standing, access)?;
    Ok((course, standing))
}

pub async fn activity(
    store: &dyn Store,
    caller: &Caller,
    id: Uuid,
    access: Access,
) -> Result<(Activity, Course, Standing), ApiError> {
    let activity = store.activity(id).await?.ok_or(ApiError::NotFound("activity"))?;
    let course = store
        .course(activity.course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    let standing = standing(store, caller, &course).await?;
    authorize(&activity, caller, standing, access)?;
    Ok((activity, course, standing))
}

pub async fn run(
    store: &dyn Store,
    caller: &Caller,
    id: Uuid,
    access: Access,
) -> Result<(ActivityRun, Activity, Course), ApiError> {
    let run = store.run(id).await?.ok_or(ApiError::NotFound("run"))?;
    let activity = store
        .activity(run.activity_id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    let course = store
        .course(activity.course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    let standing = standing(store, caller, &course).await?;
    authorize(&run, caller, standing, access)?;
    Ok((run, activity, course))
}
