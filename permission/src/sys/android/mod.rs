//! Android permission backend using JNI on the host Activity.
//!
//! `requestPermissions` answers through `Activity.onRequestPermissionsResult`,
//! which the host must forward to [`deliver_request_result`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use jni::objects::{GlobalRef, JIntArray, JObject, JObjectArray, JString, JValue};
use jni::sys::{jint, jsize};
use jni::{JNIEnv, JavaVM};
use log::{error, warn};
use tokio::sync::oneshot;

use crate::{ApiLevel, AppControl, Permission, PermissionError, PermissionPlatform};

/// Request code passed to `requestPermissions`. Results carrying another code
/// belong to the host and are ignored.
pub const REQUEST_CODE: jint = 0x4645;

/// `PackageManager.PERMISSION_GRANTED`.
const PERMISSION_GRANTED: jint = 0;

const APPLICATION_DETAILS_SETTINGS: &str = "android.settings.APPLICATION_DETAILS_SETTINGS";

type RequestSender = oneshot::Sender<Vec<(Permission, bool)>>;

/// The request waiting for `onRequestPermissionsResult`.
static PENDING: Mutex<Option<RequestSender>> = Mutex::new(None);

/// Permission primitives and app actions backed by an Android Activity.
#[derive(Clone)]
pub struct AndroidActivity {
    inner: Arc<Inner>,
}

struct Inner {
    vm: JavaVM,
    activity: GlobalRef,
    api_level: ApiLevel,
}

impl fmt::Debug for AndroidActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidActivity")
            .field("api_level", &self.inner.api_level)
            .finish_non_exhaustive()
    }
}

impl AndroidActivity {
    /// Wrap the host Activity.
    ///
    /// # Errors
    /// Returns a [`PermissionError`] if the JVM handle, `Build.VERSION.SDK_INT`
    /// or a global reference to `activity` cannot be obtained.
    pub fn new(env: &mut JNIEnv, activity: &JObject) -> Result<Self, PermissionError> {
        let vm = env
            .get_java_vm()
            .map_err(|e| PermissionError::Unknown(format!("get_java_vm failed: {e}")))?;

        let sdk_int = env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
            .map_err(|e| PermissionError::Unknown(format!("SDK_INT lookup: {e}")))?
            .i()
            .map_err(|e| PermissionError::Unknown(format!("SDK_INT result: {e}")))?;

        let activity = env
            .new_global_ref(activity)
            .map_err(|e| PermissionError::Unknown(format!("new_global_ref: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                vm,
                activity,
                api_level: ApiLevel(u32::try_from(sdk_int).unwrap_or(0)),
            }),
        })
    }

    fn with_env<R>(
        &self,
        f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<R>,
    ) -> Result<R, PermissionError> {
        let mut env = self
            .inner
            .vm
            .attach_current_thread()
            .map_err(|e| PermissionError::Unknown(format!("attach_current_thread: {e}")))?;
        f(&mut env, self.inner.activity.as_obj()).map_err(|e| {
            // A thrown Java exception stays pending until cleared.
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            PermissionError::Unknown(e.to_string())
        })
    }

    fn launch_request(
        &self,
        permissions: &[Permission],
    ) -> Result<oneshot::Receiver<Vec<(Permission, bool)>>, PermissionError> {
        let len = jsize::try_from(permissions.len())
            .map_err(|_| PermissionError::Unknown("too many permissions".into()))?;

        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = PENDING.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.as_ref().is_some_and(|s| !s.is_closed()) {
                return Err(PermissionError::RequestInFlight);
            }
            *pending = Some(sender);
        }

        let launched = self.with_env(|env, activity| {
            let names = env.new_object_array(len, "java/lang/String", JObject::null())?;
            for (index, permission) in (0..).zip(permissions) {
                let name = env.new_string(permission.manifest_name())?;
                env.set_object_array_element(&names, index, name)?;
            }
            env.call_method(
                activity,
                "requestPermissions",
                "([Ljava/lang/String;I)V",
                &[JValue::Object(&names), JValue::Int(REQUEST_CODE)],
            )?;
            Ok(())
        });

        if let Err(err) = launched {
            PENDING
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            return Err(err);
        }

        Ok(receiver)
    }
}

impl PermissionPlatform for AndroidActivity {
    fn api_level(&self) -> ApiLevel {
        self.inner.api_level
    }

    fn is_granted(&self, permission: Permission) -> bool {
        let status = self.with_env(|env, activity| {
            let name = env.new_string(permission.manifest_name())?;
            env.call_method(
                activity,
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValue::Object(&name)],
            )?
            .i()
        });

        match status {
            Ok(status) => status == PERMISSION_GRANTED,
            Err(err) => {
                warn!("checkSelfPermission({permission}) failed: {err}");
                false
            }
        }
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        let show = self.with_env(|env, activity| {
            let name = env.new_string(permission.manifest_name())?;
            env.call_method(
                activity,
                "shouldShowRequestPermissionRationale",
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&name)],
            )?
            .z()
        });

        show.unwrap_or_else(|err| {
            warn!("shouldShowRequestPermissionRationale({permission}) failed: {err}");
            false
        })
    }

    fn request(
        &self,
        permissions: &[Permission],
    ) -> impl Future<Output = Result<Vec<(Permission, bool)>, PermissionError>> + Send {
        let launched = self.launch_request(permissions);
        async move {
            let receiver = launched?;
            receiver
                .await
                .map_err(|_| PermissionError::Unknown("permission request abandoned".into()))
        }
    }
}

impl AppControl for AndroidActivity {
    fn open_app_settings(&self) {
        let opened = self.with_env(|env, activity| {
            let package = env
                .call_method(activity, "getPackageName", "()Ljava/lang/String;", &[])?
                .l()?;
            let scheme = env.new_string("package")?;
            let uri = env
                .call_static_method(
                    "android/net/Uri",
                    "fromParts",
                    "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Landroid/net/Uri;",
                    &[
                        JValue::Object(&scheme),
                        JValue::Object(&package),
                        JValue::Object(&JObject::null()),
                    ],
                )?
                .l()?;
            let action = env.new_string(APPLICATION_DETAILS_SETTINGS)?;
            let intent = env.new_object(
                "android/content/Intent",
                "(Ljava/lang/String;Landroid/net/Uri;)V",
                &[JValue::Object(&action), JValue::Object(&uri)],
            )?;
            env.call_method(
                activity,
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            )?;
            Ok(())
        });

        if let Err(err) = opened {
            error!("opening application settings failed: {err}");
        }
    }

    fn exit_app(&self) {
        let finished = self.with_env(|env, activity| {
            env.call_method(activity, "finish", "()V", &[])?;
            Ok(())
        });

        if let Err(err) = finished {
            error!("finishing activity failed: {err}");
        }
    }
}

/// Forward `Activity.onRequestPermissionsResult` here.
///
/// Returns `Ok(false)` when `request_code` is not [`REQUEST_CODE`]. An empty
/// result (the OS interrupted the prompt) resolves the pending request with
/// every permission denied.
///
/// # Errors
/// Returns a [`PermissionError`] if the result arrays cannot be read.
pub fn deliver_request_result(
    env: &mut JNIEnv,
    request_code: jint,
    permissions: &JObjectArray,
    grant_results: &JIntArray,
) -> Result<bool, PermissionError> {
    if request_code != REQUEST_CODE {
        return Ok(false);
    }

    let count = env
        .get_array_length(permissions)
        .map_err(|e| PermissionError::Unknown(format!("permissions length: {e}")))?;
    let grant_count = env
        .get_array_length(grant_results)
        .map_err(|e| PermissionError::Unknown(format!("grant_results length: {e}")))?;
    let count = count.min(grant_count);

    let mut grants = vec![0; usize::try_from(count).unwrap_or(0)];
    env.get_int_array_region(grant_results, 0, &mut grants)
        .map_err(|e| PermissionError::Unknown(format!("grant_results region: {e}")))?;

    let mut results = Vec::with_capacity(grants.len());
    for (index, grant) in (0..count).zip(grants) {
        let element = env
            .get_object_array_element(permissions, index)
            .map_err(|e| PermissionError::Unknown(format!("permissions[{index}]: {e}")))?;
        let name: String = env
            .get_string(&JString::from(element))
            .map_err(|e| PermissionError::Unknown(format!("get_string: {e}")))?
            .into();

        match Permission::from_manifest_name(&name) {
            Some(permission) => results.push((permission, grant == PERMISSION_GRANTED)),
            None => warn!("ignoring result for unknown permission {name}"),
        }
    }

    let sender = PENDING
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match sender {
        Some(sender) => {
            if sender.send(results).is_err() {
                warn!("permission result arrived after the request was dropped");
            }
        }
        None => warn!("permission result arrived with no pending request"),
    }

    Ok(true)
}
